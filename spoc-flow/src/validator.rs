//! Answer validation, one rule per [`FieldType`].
//!
//! Filesystem checks are read-only probes: nothing is created or modified,
//! so validating an accepted answer a second time accepts it again.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::ValidationError;
use crate::inputs::FieldValue;
use crate::schema::FieldType;

pub fn validate(raw: &str, field_type: FieldType) -> Result<FieldValue, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyInput);
    }

    match field_type {
        FieldType::Path => validate_path(trimmed),
        FieldType::File => validate_file(trimmed),
        FieldType::Boolean => validate_boolean(trimmed),
        FieldType::Text => Ok(FieldValue::Text(raw.to_string())),
    }
}

/// Accepts a readable directory, a readable file, or a missing entry whose
/// parent directory can be listed (an output location still to be created).
fn validate_path(raw: &str) -> Result<FieldValue, ValidationError> {
    let path = absolutize(Path::new(raw))?;

    match fs::metadata(&path) {
        Ok(meta) if meta.is_dir() => {
            fs::read_dir(&path).map_err(path_error)?;
        }
        Ok(_) => {
            fs::File::open(&path).map_err(path_error)?;
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let parent = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .ok_or(ValidationError::PathNotFound)?;
            fs::read_dir(parent).map_err(path_error)?;
        }
        Err(err) => return Err(path_error(err)),
    }

    Ok(FieldValue::Path(path))
}

fn validate_file(raw: &str) -> Result<FieldValue, ValidationError> {
    let path = Path::new(raw);
    if !path.is_file() {
        return Err(ValidationError::FileNotFound);
    }
    if !raw.to_ascii_lowercase().ends_with(".csv") {
        return Err(ValidationError::NotCsv);
    }

    fs::File::open(path).map_err(|err| match err.kind() {
        io::ErrorKind::PermissionDenied => ValidationError::PermissionDenied,
        _ => ValidationError::Other(format!("File accessibility error: {err}")),
    })?;

    // Stored absolute so the job finds it from its own working directory.
    Ok(FieldValue::File(absolutize(path)?))
}

fn validate_boolean(raw: &str) -> Result<FieldValue, ValidationError> {
    match raw {
        "0" => Ok(FieldValue::Boolean(false)),
        "1" => Ok(FieldValue::Boolean(true)),
        _ => Err(ValidationError::InvalidBoolean),
    }
}

fn path_error(err: io::Error) -> ValidationError {
    match err.kind() {
        io::ErrorKind::NotFound => ValidationError::PathNotFound,
        io::ErrorKind::PermissionDenied => ValidationError::PermissionDenied,
        io::ErrorKind::NotADirectory => ValidationError::WrongKind {
            expected: "directory",
            found: "file",
        },
        io::ErrorKind::IsADirectory => ValidationError::WrongKind {
            expected: "file",
            found: "directory",
        },
        _ => ValidationError::Other(format!("Path validation error: {err}")),
    }
}

fn absolutize(path: &Path) -> Result<PathBuf, ValidationError> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| ValidationError::Other(format!("Path validation error: {e}")))?
            .join(path)
    };
    Ok(normalize(&joined))
}

/// Lexically resolves `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
