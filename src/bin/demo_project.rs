// Quick demonstration of a project session
// Run with: RUST_LOG=info cargo run --bin demo_project

use ringbuf::traits::Consumer;
use tracklane::project::PluginSlot;
use tracklane::{
    AutomationPoint, Marker, Note, Project, ProjectOptions, RouteKind, SequencerItem,
    TimeSignature, create_event_channel,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("tracklane - project session demo");
    println!("================================");

    let root = std::env::temp_dir().join("tracklane_demo");
    if root.exists() {
        std::fs::remove_dir_all(&root)?;
    }

    let (notifier, mut events) = create_event_channel(256);
    let mut project = Project::create(&root, ProjectOptions::default(), Box::new(notifier))?;
    println!("Created project at {}", root.display());

    // An item with a short phrase
    let verse = project.new_item("verse")?;
    if let Some(item) = project.item_mut(verse) {
        for (i, note_num) in [60u8, 64, 67, 72].iter().enumerate() {
            item.add_note(Note::new(i as f64, 1.0, *note_num, 100), true);
        }
    }
    project.save_item(verse, "Write verse")?;

    // Place it twice and change tempo halfway
    project
        .timeline_mut()
        .add_item(SequencerItem::new(1, 0.0, 4.0, verse, 0.0));
    project
        .timeline_mut()
        .add_item(SequencerItem::new(1, 4.0, 4.0, verse, 0.0));
    project
        .timeline_mut()
        .set_marker(Marker::tempo(4.0, 96.0, TimeSignature::new(3, 4)?))?;
    project.save_timeline("Arrange verse")?;

    let timeline = project.timeline();
    println!(
        "Beat 8 plays at {:.3}s ({} BPM at that point)",
        timeline.get_seconds_at_beat(8.0),
        timeline.get_tempo_at_pos(8.0)
    );

    // A plugin on track 1 with a filter sweep
    let track_uid = project.tracks().get(1).map(|t| t.uid).unwrap_or(1);
    project
        .track_plugins_mut(track_uid)?
        .set_plugin(PluginSlot::new(0, 2, 100))?;
    project.save_track_plugins(track_uid, "Add filter")?;
    for (beat, value) in [(0.0, 0.0), (4.0, 127.0)] {
        project
            .automation_mut()
            .add_point(AutomationPoint::new(beat, 3, value, 100, 2));
    }
    project.save_automation("Filter sweep")?;

    // Track 1 feeds track 2; the reverse would be a feedback loop
    project.toggle_route(1, 2, RouteKind::Audio)?;
    if let Err(e) = project.toggle_route(2, 1, RouteKind::Sidechain) {
        println!("Rejected as expected: {}", e);
    }

    // Undo the last route and redo it
    println!("Undo '{}'", project.history().undo_description().unwrap_or("-"));
    project.undo()?;
    println!("Track 1 sends after undo: {}", project.routing().sends(1).count());
    project.redo()?;
    println!("Track 1 sends after redo: {}", project.routing().sends(1).count());

    // Reopen from disk
    let reopened = Project::open(&root, Box::new(tracklane::NullNotifier))?;
    assert_eq!(reopened.timeline(), project.timeline());
    assert_eq!(reopened.automation(), project.automation());
    println!("Reopened project matches the session");

    println!("\nEngine events:");
    while let Some(event) = events.try_pop() {
        println!("  {}", event.name());
    }

    Ok(())
}
