//! Shared fixtures: fake build tools written as shell scripts

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assetfilter_core::application::{ExternalProcessFilter, RequireJs};
use assetfilter_core::domain::FilterOptions;
use assetfilter_core::port::id_provider::UuidProvider;
use assetfilter_core::port::time_provider::SystemTimeProvider;
use assetfilter_infra_system::{ScratchDirArtifactFactory, TokioProcessRunner};

/// Sets `$out` from the last `out=` argument, like r.js does
pub const PARSE_OUT: &str = r#"
out=""
for arg in "$@"; do
  case "$arg" in
    out=*) out="${arg#out=}" ;;
  esac
done
"#;

/// Per-test sandbox: a directory for fake tools and a scratch root
pub struct Sandbox {
    pub dir: tempfile::TempDir,
    pub scratch: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        fs::create_dir(&scratch).unwrap();
        Self { dir, scratch }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write an executable `#!/bin/sh` script whose body runs after `$out` is parsed
    pub fn tool(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n{}\n", PARSE_OUT, body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Entries left in the scratch root (must be empty after every call)
    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        fs::read_dir(&self.scratch)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    pub fn filter(&self, options: FilterOptions) -> ExternalProcessFilter {
        let time_provider = Arc::new(SystemTimeProvider);
        ExternalProcessFilter::new(
            Arc::new(RequireJs),
            options,
            Arc::new(TokioProcessRunner::new(time_provider.clone())),
            Arc::new(ScratchDirArtifactFactory::with_root(
                &self.scratch,
                Arc::new(UuidProvider),
            )),
            time_provider,
        )
    }
}

pub fn with_binary(binary: &Path) -> FilterOptions {
    FilterOptions {
        binary: Some(binary.to_path_buf()),
        ..Default::default()
    }
}
