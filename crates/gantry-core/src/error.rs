use thiserror::Error;

/// Top-level failure of an import pass. Row-level defects are warnings and
/// never surface here.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no recoverable task document found in input")]
    NoDocument,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
