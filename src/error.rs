use thiserror::Error;

pub type ClipResult<T> = Result<T, ClipError>;

/// Failures a running task can end in. Each phase of the pipeline converts
/// its collaborator's failure into one of these; the processor turns the
/// value into an `error` status transition at the task boundary.
#[derive(Debug, Error)]
pub enum ClipError {
    #[error("download failed: {0}")]
    Download(String),

    #[error("video analysis failed: {0}")]
    Probe(String),

    #[error("clip {index} failed: {message}")]
    Encode { index: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
