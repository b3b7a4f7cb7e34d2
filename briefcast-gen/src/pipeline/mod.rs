//! Briefing generation pipeline

pub mod orchestrator;

pub use orchestrator::PipelineOrchestrator;

/// Outcome of a degradable pipeline stage
///
/// Audio and video stages never abort the request: a failure is reported to
/// the client as a status message and the pipeline continues without that
/// stage's artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    /// Stage produced its artifact
    Done(T),
    /// Stage had nothing to do (e.g. empty script)
    Empty,
    /// Stage failed; the message is shown to the client
    Failed(String),
}
