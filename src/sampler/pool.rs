// Wav pool - uid to sample file lookups

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Read-only view of the project's wav pool
pub trait SamplePool {
    /// Path of the sample file registered under `uid`
    fn uid_to_path(&self, uid: u32) -> Option<PathBuf>;

    /// Duration of the sample in seconds
    fn duration_seconds(&self, uid: u32) -> Option<f64>;
}

#[derive(Debug, Clone)]
struct PoolEntry {
    path: PathBuf,
    duration_seconds: f64,
}

/// In-memory wav pool
///
/// Holds what the audio layer already knows about each registered sample.
/// Registering the same path twice returns the existing uid.
#[derive(Debug, Clone, Default)]
pub struct WavPool {
    entries: HashMap<u32, PoolEntry>,
}

impl WavPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sample under an explicit uid, replacing any previous entry
    pub fn insert<P: AsRef<Path>>(&mut self, uid: u32, path: P, duration_seconds: f64) {
        self.entries.insert(
            uid,
            PoolEntry {
                path: path.as_ref().to_path_buf(),
                duration_seconds: duration_seconds.max(0.0),
            },
        );
    }

    /// Register a sample, reusing the uid of an identical path
    pub fn register<P: AsRef<Path>>(&mut self, path: P, duration_seconds: f64) -> u32 {
        let path = path.as_ref();
        if let Some((uid, _)) = self.entries.iter().find(|(_, e)| e.path == path) {
            return *uid;
        }
        let uid = self.entries.keys().max().map_or(0, |max| max + 1);
        self.insert(uid, path, duration_seconds);
        uid
    }

    pub fn remove(&mut self, uid: u32) -> bool {
        self.entries.remove(&uid).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SamplePool for WavPool {
    fn uid_to_path(&self, uid: u32) -> Option<PathBuf> {
        self.entries.get(&uid).map(|e| e.path.clone())
    }

    fn duration_seconds(&self, uid: u32) -> Option<f64> {
        self.entries.get(&uid).map(|e| e.duration_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_deduplicates_paths() {
        let mut pool = WavPool::new();
        let a = pool.register("/samples/kick.wav", 0.5);
        let b = pool.register("/samples/snare.wav", 0.3);
        let c = pool.register("/samples/kick.wav", 0.5);

        assert_ne!(a, b);
        assert_eq!(a, c);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_lookups() {
        let mut pool = WavPool::new();
        pool.insert(3, "/samples/pad.wav", 12.0);

        assert_eq!(pool.uid_to_path(3), Some(PathBuf::from("/samples/pad.wav")));
        assert_eq!(pool.duration_seconds(3), Some(12.0));
        assert_eq!(pool.duration_seconds(4), None);

        assert!(pool.remove(3));
        assert!(pool.is_empty());
    }
}
