//! File writing helpers shared by the generator adapters and transforms.

use std::fs;
use std::path::Path;

use crate::errors::PipelineError;

/// Writes content to a file atomically using temp file + rename.
///
/// Readers see either the old or the new content, never a partially
/// written file. Parent directories are created as needed.
///
/// ## Errors
///
/// Returns `PipelineError::WriteError` if a parent directory cannot be
/// created, the temp file cannot be written, or the rename fails.
pub fn write_atomic(path: &Path, content: &str) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| PipelineError::WriteError {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content).map_err(|e| PipelineError::WriteError {
        path: temp_path.clone(),
        source: e,
    })?;

    fs::rename(&temp_path, path).map_err(|e| PipelineError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

/// Reads a UTF-8 file, mapping failures to `PipelineError::ReadError`.
pub fn read_source(path: &Path) -> Result<String, PipelineError> {
    fs::read_to_string(path).map_err(|e| PipelineError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_atomic_creates_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("models.ts");

        write_atomic(&file_path, "export type Id = string;\n").unwrap();

        assert_eq!(
            fs::read_to_string(&file_path).unwrap(),
            "export type Id = string;\n"
        );
    }

    #[test]
    fn write_atomic_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("models").join("nested").join("User.ts");

        write_atomic(&file_path, "// user").unwrap();

        assert!(file_path.exists());
    }

    #[test]
    fn write_atomic_overwrites_and_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("index.ts");

        write_atomic(&file_path, "first").unwrap();
        write_atomic(&file_path, "second").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "second");
        assert!(!temp_dir.path().join("index.tmp").exists());
    }

    #[test]
    fn read_source_reports_path_on_failure() {
        let err = read_source(Path::new("/no/such/file.ts")).unwrap_err();
        match err {
            PipelineError::ReadError { path, .. } => {
                assert_eq!(path, Path::new("/no/such/file.ts"));
            }
            other => panic!("Expected ReadError, got: {:?}", other),
        }
    }
}
