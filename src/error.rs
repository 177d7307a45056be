use std::path::PathBuf;

/// Failures surfaced by the slicing pipeline.
///
/// Each variant is local to one image or one output file; batch runs keep
/// going after any of them.
#[derive(Debug, thiserror::Error)]
pub enum SlicerError {
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
    #[error("text recognizer failed: {0}")]
    Recognizer(String),
}

impl SlicerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = SlicerError> = std::result::Result<T, E>;
