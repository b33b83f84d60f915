// Filesystem artifact factory
// Each allocation gets its own scratch directory so the output path is unique
// without pre-creating the file the tool is expected to write
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use assetfilter_core::port::{ArtifactFactory, IdProvider};

/// Prefix for per-invocation scratch directories
pub const DEFAULT_SCRATCH_PREFIX: &str = "assetfilter-";

/// File name of the build output inside a scratch directory
pub const DEFAULT_OUTPUT_NAME: &str = "output";

/// Artifact factory rooted in a temp directory
///
/// `allocate` creates `<root>/<prefix><id>/` and returns
/// `<root>/<prefix><id>/output`; `release` removes that directory.
pub struct ScratchDirArtifactFactory {
    root: PathBuf,
    prefix: String,
    output_name: String,
    id_provider: Arc<dyn IdProvider>,
}

impl ScratchDirArtifactFactory {
    /// Factory rooted in the system temp directory
    pub fn new(id_provider: Arc<dyn IdProvider>) -> Self {
        Self::with_root(std::env::temp_dir(), id_provider)
    }

    pub fn with_root(root: impl Into<PathBuf>, id_provider: Arc<dyn IdProvider>) -> Self {
        Self {
            root: root.into(),
            prefix: DEFAULT_SCRATCH_PREFIX.to_string(),
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            id_provider,
        }
    }

    /// Output file name, e.g. `bundle.js` when the tool cares about the extension
    pub fn with_output_name(mut self, output_name: impl Into<String>) -> Self {
        self.output_name = output_name.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scratch directory owning `path`, refusing anything we did not allocate
    fn scratch_dir_of<'p>(&self, path: &'p Path) -> io::Result<&'p Path> {
        let dir = path
            .parent()
            .filter(|dir| dir.parent() == Some(self.root.as_path()))
            .filter(|dir| {
                dir.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&self.prefix))
            });

        dir.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a scratch artifact of {}", path.display(), self.root.display()),
            )
        })
    }
}

impl ArtifactFactory for ScratchDirArtifactFactory {
    fn allocate(&self) -> io::Result<PathBuf> {
        let dir = self
            .root
            .join(format!("{}{}", self.prefix, self.id_provider.generate_id()));

        // create_dir fails on an existing directory, so two live allocations never share a path
        fs::create_dir(&dir)?;

        let path = dir.join(&self.output_name);
        debug!(path = %path.display(), "Allocated temporary artifact");
        Ok(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn release(&self, path: &Path) -> io::Result<()> {
        let dir = self.scratch_dir_of(path)?;
        match fs::remove_dir_all(dir) {
            Ok(()) => {
                debug!(path = %path.display(), "Released temporary artifact");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
