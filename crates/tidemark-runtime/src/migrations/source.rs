//! Discovery of migration scripts on disk.

use std::path::{Path, PathBuf};

use tracing::debug;

use tidemark_core::error::{Result, TidemarkError};
use tidemark_core::MigrationId;

/// File extension of migration scripts.
pub const MIGRATION_EXTENSION: &str = "sql";

/// How a location is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// A directory of timestamped scripts, filtered against the ledger.
    Batch,
    /// One explicit script, run regardless of the ledger and never recorded.
    SingleFile,
}

/// A migration script found on disk.
///
/// The SQL text is only read when [`MigrationFile::load_sql`] is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Parsed identifier. Always present in batch mode.
    pub id: Option<MigrationId>,
    /// File name, e.g. `20150118140555_AddUsersTable.sql`.
    pub name: String,
    /// Full path to the script.
    pub path: PathBuf,
}

impl MigrationFile {
    pub fn load_sql(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).map_err(|e| TidemarkError::io(&self.path, e))
    }
}

/// Candidates produced from one location.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    pub mode: RunMode,
    /// Sorted ascending by id in batch mode.
    pub files: Vec<MigrationFile>,
}

/// Lists migration candidates from a directory or a single file.
pub struct MigrationSource;

impl MigrationSource {
    /// Candidates at `location`.
    ///
    /// A directory yields every `*.sql` file whose name starts with a valid
    /// 14-digit timestamp, sorted by that timestamp; anything else in the
    /// directory is skipped. Two files with the same timestamp are an error.
    /// A file yields itself, whatever its name.
    pub fn list_from(location: &Path) -> Result<CandidateSet> {
        let metadata =
            std::fs::metadata(location).map_err(|e| TidemarkError::io(location, e))?;

        if metadata.is_dir() {
            let files = Self::list_dir(location)?;
            return Ok(CandidateSet {
                mode: RunMode::Batch,
                files,
            });
        }

        let name = location
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| location.display().to_string());

        Ok(CandidateSet {
            mode: RunMode::SingleFile,
            files: vec![MigrationFile {
                id: MigrationId::from_file_name(&name).ok(),
                name,
                path: location.to_path_buf(),
            }],
        })
    }

    fn list_dir(dir: &Path) -> Result<Vec<MigrationFile>> {
        let mut files = Vec::new();

        let entries = std::fs::read_dir(dir).map_err(|e| TidemarkError::io(dir, e))?;

        for entry in entries {
            let entry = entry.map_err(|e| TidemarkError::io(dir, e))?;
            let path = entry.path();

            if !path.is_file() {
                continue;
            }
            if path.extension().map(|e| e != MIGRATION_EXTENSION).unwrap_or(true) {
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string)
            else {
                debug!("Skipping non UTF-8 file name: {:?}", path);
                continue;
            };

            match MigrationId::from_file_name(&name) {
                Ok(id) => files.push(MigrationFile {
                    id: Some(id),
                    name,
                    path,
                }),
                Err(e) if e.is_recoverable() => {
                    debug!("Skipping {}: {}", name, e);
                }
                Err(e) => return Err(e),
            }
        }

        // Directory order is unspecified; the timestamp decides.
        files.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.name.cmp(&b.name)));

        // The ledger stores one row per id, so a shared id could never be
        // recorded twice.
        if let Some(pair) = files.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(TidemarkError::ConflictingIds {
                id: pair[0].id.map(|id| id.to_string()).unwrap_or_default(),
                first: pair[0].name.clone(),
                second: pair[1].name.clone(),
            });
        }

        debug!("Found {} migration file(s) in {}", files.len(), dir.display());
        Ok(files)
    }
}

/// Keep only batch candidates strictly newer than `last_applied`.
pub fn pending_after(
    files: Vec<MigrationFile>,
    last_applied: Option<MigrationId>,
) -> Vec<MigrationFile> {
    match last_applied {
        None => files,
        Some(last) => files
            .into_iter()
            .filter(|f| f.id.map(|id| id > last).unwrap_or(false))
            .collect(),
    }
}
