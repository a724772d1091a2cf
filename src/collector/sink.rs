//! Secret sinks
//!
//! A sink receives one `(field name, value)` pair at a time. The collector
//! owns the sink from a single writer task, so implementations need no
//! internal locking.

use crate::error::WriteError;
use std::fs;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// One field destined for the sink
#[derive(Clone)]
pub struct MaterializedSecret {
    /// Field name (also the file name)
    pub name: String,

    /// Field value, wiped on drop
    pub value: Zeroizing<String>,

    /// Leaf path the field came from
    pub source: String,
}

/// Destination for materialized secrets
pub trait SecretSink: Send + 'static {
    /// Store `value` under `name`, replacing any previous value
    fn write(&mut self, name: &str, value: &str) -> Result<(), WriteError>;
}

/// Directory sink: one file per field, named after the field
#[derive(Debug, Clone)]
pub struct DirSink {
    dir: PathBuf,
}

impl DirSink {
    /// Open a directory sink, creating the directory if needed
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, WriteError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| WriteError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl SecretSink for DirSink {
    fn write(&mut self, name: &str, value: &str) -> Result<(), WriteError> {
        if !is_safe_name(name) {
            return Err(WriteError::InvalidName {
                name: name.to_string(),
            });
        }

        let path = self.dir.join(name);
        fs::write(&path, value.as_bytes()).map_err(|source| WriteError::Io { path, source })
    }
}

/// A field name must be exactly one plain path component
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}
