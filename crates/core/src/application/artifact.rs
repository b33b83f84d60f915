// Scoped temporary artifact (acquire on allocate, release on every exit path)

use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::port::ArtifactFactory;

/// Temporary output artifact owned by exactly one invocation
///
/// Released explicitly via [`TemporaryArtifact::release`]; if the owner
/// returns early or unwinds, `Drop` releases it instead.
pub struct TemporaryArtifact<'a> {
    factory: &'a dyn ArtifactFactory,
    path: PathBuf,
    released: bool,
}

impl<'a> TemporaryArtifact<'a> {
    pub fn allocate(factory: &'a dyn ArtifactFactory) -> io::Result<Self> {
        let path = factory.allocate()?;
        Ok(Self {
            factory,
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> io::Result<Vec<u8>> {
        self.factory.read(&self.path)
    }

    pub fn release(mut self) -> io::Result<()> {
        self.released = true;
        self.factory.release(&self.path)
    }
}

impl Drop for TemporaryArtifact<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.factory.release(&self.path) {
            warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to release temporary artifact"
            );
        }
    }
}
