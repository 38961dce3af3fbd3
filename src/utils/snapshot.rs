use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use log::warn;
use serde_json::to_string_pretty;
use crate::models::GradeSnapshot;

/// Single-slot file holding the last grades we saw.
///
/// There is no locking: two runs at once can race on the file, so schedule at
/// most one run at a time.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored snapshot, or an empty one when the file is missing,
    /// unreadable or not a JSON list of grade objects.
    pub fn load(&self) -> GradeSnapshot {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Could not read {}: {}, treating as empty", self.path.display(), e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("{} is not a valid grade snapshot ({}), treating as empty", self.path.display(), e);
                Vec::new()
            }
        }
    }

    /// Overwrites the stored snapshot. The JSON goes to a sibling temp file first and
    /// is renamed into place, so a crash never leaves a truncated file behind.
    pub fn save(&self, snapshot: &GradeSnapshot) -> Result<()> {
        let json = to_string_pretty(snapshot).context("Failed to serialize grades")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let tmp = self.tmp_path();
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to move {} into place", tmp.display()))?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
