use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use crate::handle::{SoundCategory, SoundId};

/// Errors reported by a mixing backend.
#[derive(Debug)]
pub enum BackendError {
    Io(std::io::Error),
    Decode(String),
    OutputStream(String),
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::Decode(err) => write!(f, "decode error: {}", err),
            Self::OutputStream(err) => write!(f, "output stream error: {}", err),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<symphonia::core::errors::Error> for BackendError {
    fn from(value: symphonia::core::errors::Error) -> Self {
        match value {
            symphonia::core::errors::Error::IoError(err) => Self::Io(err),
            other => Self::Decode(other.to_string()),
        }
    }
}

/// Error type for slot allocation and engine construction.
///
/// Control operations never return this: an invalid handle turns them into a
/// silent no-op. Only `try_*` loaders and the `validate_*` helpers expose it.
#[derive(Debug)]
pub enum EngineError {
    CapacityExceeded {
        category: SoundCategory,
        capacity: usize,
    },
    LoadFailed {
        category: SoundCategory,
        path: PathBuf,
        source: BackendError,
    },
    InvalidHandle {
        category: SoundCategory,
        id: SoundId,
    },
    Backend(BackendError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapacityExceeded { category, capacity } => {
                write!(f, "{} slots exhausted (max={})", category, capacity)
            }
            Self::LoadFailed {
                category,
                path,
                source,
            } => write!(
                f,
                "failed to load {} '{}': {}",
                category,
                path.display(),
                source
            ),
            Self::InvalidHandle { category, id } => {
                write!(f, "invalid {} handle {}", category, id)
            }
            Self::Backend(err) => write!(f, "backend error: {}", err),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::LoadFailed { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BackendError> for EngineError {
    fn from(value: BackendError) -> Self {
        Self::Backend(value)
    }
}
