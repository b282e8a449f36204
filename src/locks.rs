use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slots = Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>;

/// One async lock per destination path.
///
/// Writes to the same path run one after another, writes to different paths
/// never wait on each other. Paths are compared as given, so two spellings
/// of one file (`a.mp4` and `./a.mp4`) get separate locks.
#[derive(Default)]
pub struct PathLocks {
    slots: Arc<Slots>,
}

pub struct PathGuard {
    slots: Arc<Slots>,
    path: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
}

impl PathLocks {
    pub async fn lock(&self, path: &Path) -> PathGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(path.to_path_buf()).or_default().clone()
        };

        PathGuard {
            slots: self.slots.clone(),
            path: path.to_path_buf(),
            guard: Some(slot.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        self.guard.take();

        // drop the slot once nobody holds or waits for it
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots
            .get(&self.path)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.path);
        }
    }
}
