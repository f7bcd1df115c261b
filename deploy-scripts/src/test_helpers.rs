//! Helpers shared by the unit tests

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use rand::{thread_rng, Rng};

/// A uniquely named directory under the system temp dir, removed on drop
pub(crate) struct ScratchDir {
    /// The directory's path
    path: PathBuf,
}

impl ScratchDir {
    /// Create a new, empty scratch directory
    pub(crate) fn new() -> Self {
        let path = env::temp_dir().join(format!("deploy-scripts-{}", thread_rng().gen::<u64>()));
        fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    /// The path of the directory
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// A path inside the directory
    pub(crate) fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}
