// File-backed seen state. The only thing that survives between runs.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sniper_common::SeenState;
use tracing::{info, warn};

pub struct SeenStore {
    path: PathBuf,
}

impl SeenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[cfg(test)]
    fn path(&self) -> &Path {
        &self.path
    }

    /// Read the seen state. A missing or malformed file yields an empty state.
    pub fn load(&self) -> SeenState {
        match self.try_load() {
            Ok(Some(state)) => {
                info!(
                    path = %self.path.display(),
                    posts = state.posts.len(),
                    codes = state.codes.len(),
                    "Loaded seen state"
                );
                state
            }
            Ok(None) => {
                warn!(path = %self.path.display(), "Seen file missing, starting fresh");
                SeenState::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Seen file unreadable, starting fresh");
                SeenState::default()
            }
        }
    }

    fn try_load(&self) -> Result<Option<SeenState>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("Failed to read seen file"),
        };
        let state = serde_json::from_str(&raw).context("Failed to parse seen file")?;
        Ok(Some(state))
    }

    /// Persist the seen state. Failures are logged, never returned.
    pub fn save(&self, state: &SeenState) {
        match self.try_save(state) {
            Ok(()) => info!(
                path = %self.path.display(),
                posts = state.posts.len(),
                codes = state.codes.len(),
                "Saved seen state"
            ),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed writing seen file"),
        }
    }

    /// Write to a sibling temp file and rename it into place, so an
    /// interrupted write never clobbers the previous state.
    fn try_save(&self, state: &SeenState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let json = serde_json::to_string_pretty(state).context("Failed to serialize seen state")?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).context("Failed to create temp file")?;
        tmp.write_all(json.as_bytes())
            .context("Failed to write seen state")?;
        tmp.as_file().sync_all().context("Failed to flush seen state")?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .context("Failed to replace seen file")?;
        Ok(())
    }
}
