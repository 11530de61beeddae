use std::path::Path;

use anyhow::Result;
use console::style;

use tidemark_runtime::MigrationRunner;

/// Create an empty, timestamped migration file in `location`.
pub fn run(location: &Path, name: &str) -> Result<()> {
    let path = MigrationRunner::create(location, name)?;

    println!(
        "  {} Created {}",
        style("✓").green(),
        style(path.display()).cyan()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_writes_empty_sql_file() {
        let dir = TempDir::new().unwrap();
        run(dir.path(), "AddUsersTable").unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with("_AddUsersTable.sql"));
        assert_eq!(entries[0].len(), "YYYYMMDDHHMMSS_AddUsersTable.sql".len());
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        assert!(run(Path::new("/nonexistent/migrations"), "Init").is_err());
    }
}
