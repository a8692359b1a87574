use thiserror::Error;

/// Reasons the playback controller refuses to start a run.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no words are selected")]
    EmptySelection,

    #[error("the playback pattern is empty; add at least one item in settings")]
    EmptyPattern,

    #[error("playback is already running")]
    AlreadyPlaying,

    #[error("failed to load the selection: {0}")]
    Store(#[from] anyhow::Error),
}

impl PlaybackError {
    /// Configuration problems the user has to fix before playback can run.
    pub fn is_blocking(&self) -> bool {
        matches!(self, PlaybackError::EmptyPattern)
    }
}
