use std::time::Duration;

use futures::future::try_join_all;
use tracing::{debug, info, warn};

use crate::error::MarkError;
use crate::llm::GeminiClient;
use crate::models::{GradingResult, OutputMode, Score, ScoreStatus};
use crate::pipeline::parse::parse_reply;
use crate::pipeline::request::GradingRequest;

/// Configuration for backend invocation.
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    /// Number of independent passes over the same request. Passes exist to
    /// stabilize the score, not to merge prose.
    pub passes: u32,
    /// Attempt ceiling per pass for transient backend failures.
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    pub backoff_base_ms: u64,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            passes: 1,
            max_attempts: 3,
            backoff_base_ms: 500,
        }
    }
}

/// Execute a grading request against the backend.
///
/// With `passes > 1`, all passes are issued concurrently against the same
/// request and the call blocks until every pass returns. Dropping the
/// returned future drops any pending passes; no partial aggregate is ever
/// computed.
pub async fn invoke(
    client: &GeminiClient,
    request: &GradingRequest,
    mode: OutputMode,
    config: &InvokerConfig,
) -> Result<GradingResult, MarkError> {
    let passes = config.passes.max(1);

    if passes == 1 {
        return run_pass(client, request, mode, config, 0).await;
    }

    info!("Issuing {} grading passes", passes);
    let results = try_join_all((0..passes).map(|i| run_pass(client, request, mode, config, i)))
        .await?;

    Ok(aggregate_passes(&results))
}

/// One backend pass: call with bounded backoff on transient failures, then
/// parse the reply. Rejections and malformed replies are never retried.
async fn run_pass(
    client: &GeminiClient,
    request: &GradingRequest,
    mode: OutputMode,
    config: &InvokerConfig,
    pass: u32,
) -> Result<GradingResult, MarkError> {
    let mut last_reason = String::new();

    for attempt in 1..=config.max_attempts {
        if attempt > 1 {
            let delay = backoff_delay(attempt, config.backoff_base_ms);
            warn!(
                "Pass {}: attempt {} of {} after {:?} ({})",
                pass, attempt, config.max_attempts, delay, last_reason
            );
            tokio::time::sleep(delay).await;
        }

        match client.generate(request, mode).await {
            Ok(text) => {
                debug!("Pass {}: reply of {} chars", pass, text.len());
                return Ok(parse_reply(&text, mode));
            }
            Err(e) if e.is_retryable() => {
                last_reason = e.to_string();
            }
            Err(e) => return Err(e),
        }
    }

    Err(MarkError::BackendUnavailable {
        attempts: config.max_attempts,
        reason: last_reason,
    })
}

/// Backoff before the given attempt number (attempts are 1-based; the first
/// retry waits the base delay, each further retry doubles it).
fn backoff_delay(attempt: u32, base_ms: u64) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(1 << (attempt.saturating_sub(2)).min(16)))
}

/// Fold per-pass results into one aggregate.
///
/// The aggregate numerator is the arithmetic mean of the valid passes'
/// numerators over their shared denominator, rounded to the nearest integer.
/// Feedback is taken from the first pass. Passes that disagree on the
/// denominator make the aggregate invalid rather than averaging unlike
/// quantities; unscored and invalid passes are excluded from the mean. When
/// no pass is valid, the aggregate carries the invalidity reasons instead of
/// reporting a plain unscored result.
pub fn aggregate_passes(passes: &[GradingResult]) -> GradingResult {
    let feedback = passes
        .first()
        .map(|p| p.feedback.clone())
        .unwrap_or_default();

    let scored: Vec<Score> = passes
        .iter()
        .filter(|p| p.status.is_valid())
        .map(|p| p.score)
        .collect();

    let Some(first) = scored.first() else {
        let reasons: Vec<&str> = passes
            .iter()
            .filter_map(|p| match &p.status {
                ScoreStatus::Invalid(reason) => Some(reason.as_str()),
                _ => None,
            })
            .collect();

        let status = if reasons.is_empty() {
            ScoreStatus::Unscored
        } else {
            ScoreStatus::Invalid(format!(
                "no pass produced a usable score: {}",
                reasons.join("; ")
            ))
        };

        return GradingResult {
            feedback,
            score: Score::unscored(),
            status,
        };
    };

    let denominator = first.denominator;
    if scored.iter().any(|s| s.denominator != denominator) {
        return GradingResult {
            feedback,
            score: Score::new(0, denominator),
            status: ScoreStatus::Invalid("passes disagree on the score denominator".to_string()),
        };
    }

    let mean = scored.iter().map(|s| s.numerator as f64).sum::<f64>() / scored.len() as f64;
    let score = Score::new(mean.round() as u32, denominator);

    GradingResult {
        feedback,
        status: score.validate(),
        score,
    }
}
