use std::path::Path;

use anyhow::{Context, Result};

/// Capability to show a checked file to the user.
///
/// Kept behind a trait so classification runs headless; the desktop behaviour is
/// one implementation among others.
pub trait ResultOpener {
    fn open(&self, path: &Path) -> Result<()>;
}

/// Hands the file to the host's default application.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl ResultOpener for SystemOpener {
    fn open(&self, path: &Path) -> Result<()> {
        open::that(path).with_context(|| format!("failed to open {}", path.display()))
    }
}

/// Opener that never opens anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOpener;

impl ResultOpener for NoopOpener {
    fn open(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}
