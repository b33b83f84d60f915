// Temporary Artifact Port
// Injectable so tests can use deterministic paths without touching the filesystem

use std::io;
use std::path::{Path, PathBuf};

/// Factory for per-invocation temporary output artifacts
///
/// Every `allocate` call must return a path no other live allocation shares.
/// The artifact itself need not exist until the external tool writes it.
pub trait ArtifactFactory: Send + Sync {
    /// Reserve a fresh output path
    fn allocate(&self) -> io::Result<PathBuf>;

    /// Read the whole artifact in binary mode
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Delete the artifact and anything reserved alongside it
    ///
    /// Releasing an artifact the tool never wrote is not an error.
    fn release(&self, path: &Path) -> io::Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// In-memory artifact store with deterministic paths
    /// (`/virtual/artifact-1.out`, `/virtual/artifact-2.out`, ...)
    #[derive(Default)]
    pub struct InMemoryArtifacts {
        counter: AtomicU64,
        files: Mutex<HashMap<PathBuf, Vec<u8>>>,
        live: Mutex<HashSet<PathBuf>>,
        allocated: Mutex<Vec<PathBuf>>,
        fail_allocation: bool,
        fail_release: bool,
    }

    impl InMemoryArtifacts {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn new_failing_allocation() -> Self {
            Self {
                fail_allocation: true,
                ..Self::default()
            }
        }

        pub fn new_failing_release() -> Self {
            Self {
                fail_release: true,
                ..Self::default()
            }
        }

        /// Simulate the external tool writing its output
        pub fn write(&self, path: &Path, bytes: &[u8]) {
            self.files
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), bytes.to_vec());
        }

        /// Allocated and not yet released
        pub fn live_count(&self) -> usize {
            self.live.lock().unwrap().len()
        }

        pub fn exists(&self, path: &Path) -> bool {
            self.files.lock().unwrap().contains_key(path)
        }

        pub fn allocated_paths(&self) -> Vec<PathBuf> {
            self.allocated.lock().unwrap().clone()
        }
    }

    impl ArtifactFactory for InMemoryArtifacts {
        fn allocate(&self) -> io::Result<PathBuf> {
            if self.fail_allocation {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "mock scratch space is read-only",
                ));
            }

            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            let path = PathBuf::from(format!("/virtual/artifact-{}.out", n));
            self.live.lock().unwrap().insert(path.clone());
            self.allocated.lock().unwrap().push(path.clone());
            Ok(path)
        }

        fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.files.lock().unwrap().get(path).cloned().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} was never written", path.display()),
                )
            })
        }

        fn release(&self, path: &Path) -> io::Result<()> {
            if self.fail_release {
                return Err(io::Error::new(io::ErrorKind::Other, "mock release failure"));
            }
            self.files.lock().unwrap().remove(path);
            self.live.lock().unwrap().remove(path);
            Ok(())
        }
    }
}
