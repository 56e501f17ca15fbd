// Project session - loads a project directory and persists every edit
// through the history log

use crate::automation::AutomationRegion;
use crate::codec::TextCodec;
use crate::error::{ProjectError, ProjectResult, ReferenceKind};
use crate::history::HistoryLog;
use crate::messaging::{EngineEvent, Notifier};
use crate::project::directory::ItemDirectory;
use crate::project::files::{
    AUTOMATION_FILE, HISTORY_FILE, ITEMS_FILE, MIDI_ROUTING_FILE, ROUTING_FILE, SEQUENCER_FILE,
    TRACKS_FILE, display_path, read_component, read_optional, write_component,
};
use crate::project::options::ProjectOptions;
use crate::project::tracks::{TrackList, TrackPlugins};
use crate::routing::{MASTER_TRACK, MidiRouting, RouteKind, RoutingGraph, ToggleOutcome};
use crate::sequencer::{Item, ItemUid, TRACK_COUNT, Timeline};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Everything decoded from the project files
#[derive(Debug, Clone)]
struct ProjectState {
    timeline: Timeline,
    automation: AutomationRegion,
    routing: RoutingGraph,
    midi_routing: MidiRouting,
    directory: ItemDirectory,
    tracks: TrackList,
    items: BTreeMap<ItemUid, Item>,
    /// Keyed by track uid
    track_plugins: BTreeMap<u32, TrackPlugins>,
}

impl ProjectState {
    fn new(options: &ProjectOptions) -> Self {
        let mut routing = RoutingGraph::new();
        for track in 1..TRACK_COUNT {
            routing.set_default_output(track, MASTER_TRACK);
        }
        Self {
            timeline: Timeline::new(options.default_bpm, options.default_tsig),
            automation: AutomationRegion::new(),
            routing,
            midi_routing: MidiRouting::new(),
            directory: ItemDirectory::new(),
            tracks: TrackList::new(),
            items: BTreeMap::new(),
            track_plugins: BTreeMap::new(),
        }
    }

    fn load(root: &Path, options: &ProjectOptions) -> ProjectResult<Self> {
        let timeline = read_component(root, "", SEQUENCER_FILE)?;
        let automation = read_component(root, "", AUTOMATION_FILE)?;
        let routing = read_component(root, "", ROUTING_FILE)?;
        let midi_routing = read_component(root, "", MIDI_ROUTING_FILE)?;
        let directory: ItemDirectory = read_component(root, "", ITEMS_FILE)?;
        let tracks: TrackList = read_component(root, "", TRACKS_FILE)?;

        let mut items = BTreeMap::new();
        for uid in directory.uids() {
            if let Some(item) = read_item(root, &options.items_folder, uid)? {
                items.insert(uid, item);
            } else {
                log::warn!("Item {} is listed but has no file, dropping it", uid);
            }
        }

        let mut track_plugins = BTreeMap::new();
        for uid in tracks.uids() {
            let file = uid.to_string();
            if let Some(plugins) = read_optional(root, &options.tracks_folder, &file)? {
                track_plugins.insert(uid, plugins);
            }
        }

        let mut state = Self {
            timeline,
            automation,
            routing,
            midi_routing,
            directory,
            tracks,
            items,
            track_plugins,
        };
        state.drop_dangling();
        Ok(state)
    }

    /// Remove references to items and plugins that do not exist
    fn drop_dangling(&mut self) {
        self.directory.retain_uids(|uid| self.items.contains_key(&uid));

        let missing: BTreeSet<ItemUid> = self
            .timeline
            .item_uids()
            .into_iter()
            .filter(|uid| !self.items.contains_key(uid))
            .collect();
        if !missing.is_empty() {
            log::warn!("Dropping placements of unknown items {:?}", missing);
            self.timeline
                .retain_items(|i| !missing.contains(&i.item_uid));
        }

        let plugins: BTreeSet<u32> = self
            .track_plugins
            .values()
            .flat_map(|p| p.plugin_uids())
            .collect();
        self.automation.retain_plugins(|uid| {
            let known = plugins.contains(&uid);
            if !known {
                log::warn!("Dropping automation of unknown plugin {}", uid);
            }
            known
        });
    }
}

fn read_item(root: &Path, folder: &str, uid: ItemUid) -> ProjectResult<Option<Item>> {
    let file = uid.to_string();
    let text = match fs::read_to_string(root.join(folder).join(&file)) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Item::decode_with_uid(uid, &text)
        .map(Some)
        .map_err(|e| ProjectError::format(display_path(folder, &file), e))
}

/// One file to write as part of a commit
struct Staged {
    folder: String,
    file: String,
    text: String,
}

impl Staged {
    fn root(file: &str, text: String) -> Self {
        Self {
            folder: String::new(),
            file: file.to_string(),
            text,
        }
    }
}

/// An open project directory
///
/// Edits are made on the in-memory components and then persisted with the
/// matching `save_*` call, which writes the file, records one history
/// commit and notifies the engine.
pub struct Project {
    root: PathBuf,
    options: ProjectOptions,
    state: ProjectState,
    history: HistoryLog,
    notifier: Box<dyn Notifier>,
}

impl Project {
    /// Create a new project directory with default contents
    pub fn create(
        root: impl Into<PathBuf>,
        options: ProjectOptions,
        notifier: Box<dyn Notifier>,
    ) -> ProjectResult<Self> {
        let root = root.into();
        options.validate()?;
        if root.join(SEQUENCER_FILE).exists() {
            return Err(ProjectError::InvalidValue(format!(
                "a project already exists at {}",
                root.display()
            )));
        }
        fs::create_dir_all(root.join(&options.items_folder))?;
        fs::create_dir_all(root.join(&options.tracks_folder))?;
        options.save(&root)?;

        let state = ProjectState::new(&options);
        write_component(&root, "", SEQUENCER_FILE, &state.timeline)?;
        write_component(&root, "", AUTOMATION_FILE, &state.automation)?;
        write_component(&root, "", ROUTING_FILE, &state.routing)?;
        write_component(&root, "", MIDI_ROUTING_FILE, &state.midi_routing)?;
        write_component(&root, "", ITEMS_FILE, &state.directory)?;
        write_component(&root, "", TRACKS_FILE, &state.tracks)?;

        log::info!("Created project at {}", root.display());
        let history = HistoryLog::with_capacity(root.clone(), options.max_history);
        Ok(Self {
            root,
            options,
            state,
            history,
            notifier,
        })
    }

    /// Open an existing project directory
    ///
    /// A file that fails to decode aborts the open with a format error
    /// naming it. Dangling item and plugin references are dropped.
    pub fn open(root: impl Into<PathBuf>, notifier: Box<dyn Notifier>) -> ProjectResult<Self> {
        let root = root.into();
        let options = ProjectOptions::load(&root)?;
        let state = ProjectState::load(&root, &options)?;

        let mut history = HistoryLog::with_capacity(root.clone(), options.max_history);
        let journal = root.join(HISTORY_FILE);
        if journal.exists()
            && let Err(e) = history.load_journal(&journal)
        {
            log::warn!("Ignoring unreadable history journal: {}", e);
            history = HistoryLog::with_capacity(root.clone(), options.max_history);
        }

        log::info!(
            "Opened project at {} ({} items)",
            root.display(),
            state.items.len()
        );
        Ok(Self {
            root,
            options,
            state,
            history,
            notifier,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &ProjectOptions {
        &self.options
    }

    pub fn timeline(&self) -> &Timeline {
        &self.state.timeline
    }

    pub fn timeline_mut(&mut self) -> &mut Timeline {
        &mut self.state.timeline
    }

    pub fn items(&self) -> &BTreeMap<ItemUid, Item> {
        &self.state.items
    }

    pub fn item(&self, uid: ItemUid) -> Option<&Item> {
        self.state.items.get(&uid)
    }

    pub fn item_mut(&mut self, uid: ItemUid) -> Option<&mut Item> {
        self.state.items.get_mut(&uid)
    }

    pub fn directory(&self) -> &ItemDirectory {
        &self.state.directory
    }

    pub fn automation(&self) -> &AutomationRegion {
        &self.state.automation
    }

    pub fn automation_mut(&mut self) -> &mut AutomationRegion {
        &mut self.state.automation
    }

    pub fn routing(&self) -> &RoutingGraph {
        &self.state.routing
    }

    pub fn routing_mut(&mut self) -> &mut RoutingGraph {
        &mut self.state.routing
    }

    pub fn midi_routing(&self) -> &MidiRouting {
        &self.state.midi_routing
    }

    pub fn midi_routing_mut(&mut self) -> &mut MidiRouting {
        &mut self.state.midi_routing
    }

    pub fn tracks(&self) -> &TrackList {
        &self.state.tracks
    }

    pub fn tracks_mut(&mut self) -> &mut TrackList {
        &mut self.state.tracks
    }

    /// Plugin chain of a track, by track uid
    pub fn track_plugins(&self, track_uid: u32) -> Option<&TrackPlugins> {
        self.state.track_plugins.get(&track_uid)
    }

    pub fn track_plugins_mut(&mut self, track_uid: u32) -> ProjectResult<&mut TrackPlugins> {
        if self.state.tracks.by_uid(track_uid).is_none() {
            return Err(ProjectError::reference(ReferenceKind::Track, track_uid));
        }
        Ok(self.state.track_plugins.entry(track_uid).or_default())
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Select the history context later saves commit to
    pub fn set_history_context(&mut self, id: u32) {
        self.history.set_context(id);
    }

    /// Write files, record them as one commit, then notify
    ///
    /// If a write fails, the files already written are still committed so
    /// history matches the disk.
    fn persist(
        &mut self,
        message: &str,
        files: Vec<Staged>,
        events: Vec<EngineEvent>,
    ) -> ProjectResult<bool> {
        let mut result = Ok(());
        for staged in &files {
            result = self.history.stage(&staged.folder, &staged.file, &staged.text);
            if result.is_err() {
                break;
            }
        }
        let committed = self.history.commit(message);
        if let Err(e) = self.history.save_journal(&self.root.join(HISTORY_FILE)) {
            log::warn!("Failed to save history journal: {}", e);
        }
        result?;

        if committed {
            log::info!("Saved '{}' ({} files)", message, files.len());
            for event in events {
                self.notifier.notify(event);
            }
        } else {
            log::debug!("'{}' changed nothing", message);
        }
        Ok(committed)
    }

    /// Persist the timeline
    ///
    /// Fails without writing if a placement refers to an unknown item.
    pub fn save_timeline(&mut self, message: &str) -> ProjectResult<bool> {
        if self.options.fix_overlaps_on_save {
            self.state.timeline.fix_overlaps();
        }
        if let Some(uid) = self
            .state
            .timeline
            .item_uids()
            .into_iter()
            .find(|uid| !self.state.items.contains_key(uid))
        {
            return Err(ProjectError::reference(ReferenceKind::Item, uid));
        }
        let text = self.state.timeline.encode();
        self.persist(
            message,
            vec![Staged::root(SEQUENCER_FILE, text)],
            vec![EngineEvent::TimelineSaved],
        )
    }

    fn staged_item(&self, uid: ItemUid) -> ProjectResult<Staged> {
        let item = self
            .state
            .items
            .get(&uid)
            .ok_or_else(|| ProjectError::reference(ReferenceKind::Item, uid))?;
        Ok(Staged {
            folder: self.options.items_folder.clone(),
            file: uid.to_string(),
            text: item.encode(),
        })
    }

    pub fn save_item(&mut self, uid: ItemUid, message: &str) -> ProjectResult<bool> {
        let staged = self.staged_item(uid)?;
        self.persist(message, vec![staged], vec![EngineEvent::ItemSaved { uid }])
    }

    pub fn save_automation(&mut self, message: &str) -> ProjectResult<bool> {
        let text = self.state.automation.encode();
        self.persist(
            message,
            vec![Staged::root(AUTOMATION_FILE, text)],
            vec![EngineEvent::AutomationSaved],
        )
    }

    pub fn save_routing(&mut self, message: &str) -> ProjectResult<bool> {
        let text = self.state.routing.encode();
        self.persist(
            message,
            vec![Staged::root(ROUTING_FILE, text)],
            vec![EngineEvent::RoutingUpdated],
        )
    }

    pub fn save_midi_routing(&mut self, message: &str) -> ProjectResult<bool> {
        let text = self.state.midi_routing.encode();
        self.persist(
            message,
            vec![Staged::root(MIDI_ROUTING_FILE, text)],
            vec![EngineEvent::MidiRoutingUpdated],
        )
    }

    pub fn save_tracks(&mut self, message: &str) -> ProjectResult<bool> {
        let text = self.state.tracks.encode();
        self.persist(
            message,
            vec![Staged::root(TRACKS_FILE, text)],
            vec![EngineEvent::TracksSaved],
        )
    }

    pub fn save_track_plugins(&mut self, track_uid: u32, message: &str) -> ProjectResult<bool> {
        let text = self.track_plugins_mut(track_uid)?.encode();
        let staged = Staged {
            folder: self.options.tracks_folder.clone(),
            file: track_uid.to_string(),
            text,
        };
        self.persist(
            message,
            vec![staged],
            vec![EngineEvent::TrackPluginsSaved { track_uid }],
        )
    }

    /// Create an empty Item under a unique version of `name`
    pub fn new_item(&mut self, name: &str) -> ProjectResult<ItemUid> {
        let uid = self.state.directory.add(name)?;
        self.state.items.insert(uid, Item::new(uid));

        let files = vec![
            Staged::root(ITEMS_FILE, self.state.directory.encode()),
            self.staged_item(uid)?,
        ];
        let message = format!("New item '{}'", name);
        self.persist(&message, files, vec![EngineEvent::ItemSaved { uid }])?;
        Ok(uid)
    }

    pub fn rename_item(&mut self, uid: ItemUid, name: &str) -> ProjectResult<bool> {
        self.state.directory.rename(uid, name)?;
        let text = self.state.directory.encode();
        let message = format!("Rename item {} to '{}'", uid, name);
        self.persist(&message, vec![Staged::root(ITEMS_FILE, text)], Vec::new())
    }

    /// Add or remove a send and persist the routing
    ///
    /// A rejected toggle leaves both memory and disk untouched.
    pub fn toggle_route(
        &mut self,
        src: u8,
        dest: u8,
        kind: RouteKind,
    ) -> ProjectResult<ToggleOutcome> {
        let outcome = match self.state.routing.toggle(src, dest, kind) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("Rejected route {} -> {}: {}", src, dest, e);
                return Err(e);
            }
        };
        let message = match outcome {
            ToggleOutcome::Added { .. } => format!("Route track {} to {}", src, dest),
            ToggleOutcome::Removed { .. } => format!("Remove route {} to {}", src, dest),
        };
        self.save_routing(&message)?;
        Ok(outcome)
    }

    /// Move tracks to new positions in one undoable step
    ///
    /// `map` goes from old to new track number and must permute its keys.
    /// The master track cannot move.
    pub fn reorder_tracks(&mut self, map: &HashMap<u8, u8>) -> ProjectResult<bool> {
        if map
            .iter()
            .any(|(from, to)| (*from == MASTER_TRACK || *to == MASTER_TRACK) && from != to)
        {
            return Err(ProjectError::InvalidValue(
                "the master track cannot be reordered".to_string(),
            ));
        }
        self.state.tracks.reorder(map)?;
        self.state.timeline.reorder_tracks(map);
        self.state.routing.reorder_tracks(map);
        self.state.midi_routing.reorder_tracks(map);

        let files = vec![
            Staged::root(SEQUENCER_FILE, self.state.timeline.encode()),
            Staged::root(ROUTING_FILE, self.state.routing.encode()),
            Staged::root(MIDI_ROUTING_FILE, self.state.midi_routing.encode()),
            Staged::root(TRACKS_FILE, self.state.tracks.encode()),
        ];
        self.persist(
            "Reorder tracks",
            files,
            vec![
                EngineEvent::TimelineSaved,
                EngineEvent::RoutingUpdated,
                EngineEvent::MidiRoutingUpdated,
                EngineEvent::TracksSaved,
            ],
        )
    }

    /// Revert the last commit of the current history context
    pub fn undo(&mut self) -> ProjectResult<bool> {
        if !self.history.undo()? {
            return Ok(false);
        }
        self.after_restore()?;
        Ok(true)
    }

    /// Re-apply the last undone commit of the current history context
    pub fn redo(&mut self) -> ProjectResult<bool> {
        if !self.history.redo()? {
            return Ok(false);
        }
        self.after_restore()?;
        Ok(true)
    }

    fn after_restore(&mut self) -> ProjectResult<()> {
        if let Err(e) = self.history.save_journal(&self.root.join(HISTORY_FILE)) {
            log::warn!("Failed to save history journal: {}", e);
        }
        self.state = ProjectState::load(&self.root, &self.options)?;
        let files = self.history.restored_files().to_vec();
        self.notifier.notify(EngineEvent::HistoryRestored { files });
        Ok(())
    }
}
