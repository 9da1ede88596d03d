pub mod invoke;
pub mod normalize;
pub mod parse;
pub mod request;

use tracing::info;

use crate::error::MarkError;
use crate::llm::GeminiClient;
use crate::models::{GradingResult, Submission};
use crate::reference::KeyResolver;

pub use invoke::{InvokerConfig, aggregate_passes, invoke};
pub use normalize::{normalize_page, normalize_submission};
pub use parse::parse_reply;
pub use request::{GradingRequest, RubricConfig, build_request};

/// Configuration for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub rubric: RubricConfig,
    pub invoker: InvokerConfig,
}

/// Run the grading pipeline for one submission, end to end.
///
/// Normalize -> resolve key -> build request -> invoke -> parsed result.
/// Every failure is scoped to this submission; nothing is shared across
/// runs except the memoized reference key. Recording the result in the
/// gradebook is the caller's responsibility, so a persistence failure can
/// never discard the grading outcome.
pub async fn grade_submission(
    client: &GeminiClient,
    resolver: &KeyResolver,
    submission: &Submission,
    config: &PipelineConfig,
) -> Result<GradingResult, MarkError> {
    info!(
        "Submission {}: grading {} page(s) for {}",
        submission.submission_id,
        submission.page_count(),
        submission.student
    );

    // Fail fast on unreadable pages, before any backend quota is spent.
    let pages = normalize_submission(submission)?;

    // The request is never built before the key resolves.
    let key = resolver.resolve().await?;

    let request = build_request(submission, key, pages, &config.rubric);
    let result = invoke(client, &request, config.rubric.mode, &config.invoker).await?;

    info!(
        "Submission {}: mark {} ({:?})",
        submission.submission_id,
        result.mark(),
        result.status
    );

    Ok(result)
}
