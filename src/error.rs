use std::path::PathBuf;

use thiserror::Error;

/// Coarse error category reported to the front end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    CorruptState,
    Persistence,
    InvalidGesture,
    ImageListEmpty,
}

/// Why a finished gesture was not turned into an annotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum GestureIssue {
    #[error("no class selected")]
    NoClassSelected,
    #[error("no image open")]
    NoImage,
}

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("annotation file {} is not valid: {source}", path.display())]
    CorruptState {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to read annotation file {}: {source}", path.display())]
    ReadState {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write annotation file {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid gesture: {0}")]
    InvalidGesture(GestureIssue),
    #[error("no supported images in {}", .0.display())]
    ImageListEmpty(PathBuf),
    #[error("failed to read folder {}: {source}", path.display())]
    ReadFolder {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read config file {}: {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config file {} is not valid: {source}", path.display())]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl AnnotateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnnotateError::CorruptState { .. } | AnnotateError::Config { .. } => {
                ErrorKind::CorruptState
            }
            AnnotateError::ReadState { .. }
            | AnnotateError::ReadConfig { .. }
            | AnnotateError::Persistence { .. } => ErrorKind::Persistence,
            AnnotateError::InvalidGesture(_) => ErrorKind::InvalidGesture,
            AnnotateError::ImageListEmpty(_) | AnnotateError::ReadFolder { .. } => {
                ErrorKind::ImageListEmpty
            }
        }
    }
}

pub type Result<T, E = AnnotateError> = std::result::Result<T, E>;
