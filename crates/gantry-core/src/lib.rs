pub mod diff;
pub mod error;
pub mod hash;
pub mod history;
pub mod keys;
pub mod normalize;
pub mod recover;
pub mod snapshot;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::PipelineError;
pub use store::TaskStore;
pub use types::*;

/// A recovered and normalized document, not yet persisted.
#[derive(Debug, Clone)]
pub struct PreparedImport {
    pub raw: RawImport,
    pub result: NormalizeResult,
    /// SHA-256 of the source text as given.
    pub source_digest: String,
}

/// Prepared import plus its diff against the previous generation.
#[derive(Debug, Clone)]
pub struct Preview {
    pub prepared: PreparedImport,
    pub diff: DiffResult,
}

/// Run recovery and normalization over `text`.
pub fn prepare_import(text: &str) -> Result<PreparedImport, PipelineError> {
    let raw = recover::extract_import(text).ok_or(PipelineError::NoDocument)?;
    let result = normalize::normalize(&raw);
    Ok(PreparedImport {
        raw,
        result,
        source_digest: hash::source_digest(text),
    })
}

/// Prepare `text` and diff it against the generation returned by `previous`.
///
/// `previous` is only called once the text is known to hold a document.
pub fn preview_with<F>(text: &str, previous: F) -> Result<Preview, PipelineError>
where
    F: FnOnce() -> anyhow::Result<Vec<NormalizedTask>>,
{
    let prepared = prepare_import(text)?;
    let prev = previous()?;
    let diff = diff::diff_tasks(&prev, &prepared.result.tasks);
    Ok(Preview { prepared, diff })
}
