use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::models::{GradingResult, OutputMode, Score, ScoreStatus};

/// Literal marker the lenient parser scans for.
const SCORE_MARKER: &str = "SCORE:";

fn score_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(r"{}\s*(\d{{1,9}})\s*/\s*(\d{{1,9}})", SCORE_MARKER)).unwrap()
    })
}

/// Strict-mode reply shape: a JSON object with required fields.
#[derive(Debug, Deserialize)]
struct StrictReply {
    feedback: String,
    score: String,
}

/// Extract feedback and score from one backend reply.
///
/// Strict mode requires a structured object; lenient mode scans free text
/// for a trailing score marker. Neither path ever discards the reply: a
/// shape mismatch keeps the raw text as feedback and flags the result
/// invalid, a missing marker yields an unscored result, and an extracted
/// score that fails validation is flagged invalid. The caller always gets
/// the feedback for manual review.
pub fn parse_reply(text: &str, mode: OutputMode) -> GradingResult {
    match mode {
        OutputMode::Strict => parse_strict(text),
        OutputMode::Lenient => parse_lenient(text),
    }
}

fn parse_strict(text: &str) -> GradingResult {
    let reply: StrictReply = match serde_json::from_str(text.trim()) {
        Ok(reply) => reply,
        Err(e) => {
            // The raw reply is all the feedback there is; keep it.
            return flagged_invalid(
                text.to_string(),
                format!("reply is not the required JSON object: {}", e),
            );
        }
    };

    match parse_score_string(&reply.score) {
        Some(score) => with_validation(reply.feedback, score),
        None => flagged_invalid(
            reply.feedback,
            format!("score field {:?} is not of the form N/M", reply.score),
        ),
    }
}

fn parse_lenient(text: &str) -> GradingResult {
    // Take the last marker occurrence so feedback prose mentioning earlier
    // scores does not shadow the final one.
    let extracted = score_pattern()
        .captures_iter(text)
        .last()
        .and_then(|caps| {
            let numerator = caps[1].parse::<u32>().ok()?;
            let denominator = caps[2].parse::<u32>().ok()?;
            Some(Score::new(numerator, denominator))
        });

    match extracted {
        Some(score) => with_validation(text.to_string(), score),
        None => {
            warn!("No {} marker found in reply; result is unscored", SCORE_MARKER);
            GradingResult {
                feedback: text.to_string(),
                score: Score::unscored(),
                status: ScoreStatus::Unscored,
            }
        }
    }
}

/// Parse a `<integer>/<integer>` score string.
fn parse_score_string(raw: &str) -> Option<Score> {
    let (numerator, denominator) = raw.trim().split_once('/')?;
    Some(Score::new(
        numerator.trim().parse().ok()?,
        denominator.trim().parse().ok()?,
    ))
}

fn with_validation(feedback: String, score: Score) -> GradingResult {
    let status = score.validate();
    if let ScoreStatus::Invalid(reason) = &status {
        warn!("Extracted score {} failed validation: {}", score, reason);
    }
    GradingResult {
        feedback,
        score,
        status,
    }
}

fn flagged_invalid(feedback: String, reason: String) -> GradingResult {
    warn!("Malformed reply kept for manual review: {}", reason);
    GradingResult {
        feedback,
        score: Score::unscored(),
        status: ScoreStatus::Invalid(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_round_trip() {
        let reply = r#"{"feedback": "Good work on fractions.", "score": "17/20"}"#;
        let result = parse_reply(reply, OutputMode::Strict);

        assert_eq!(result.feedback, "Good work on fractions.");
        assert_eq!(result.score, Score::new(17, 20));
        assert!(result.status.is_valid());
    }

    #[test]
    fn test_strict_malformed_structure_keeps_feedback() {
        let reply = "Sure! The student did well, I would say 17/20.";
        let result = parse_reply(reply, OutputMode::Strict);

        // The reply text must survive as feedback even though the shape is
        // wrong; the operator reads it on the manual review path.
        assert_eq!(result.feedback, reply);
        assert_eq!(result.score, Score::unscored());
        assert!(matches!(result.status, ScoreStatus::Invalid(_)));
    }

    #[test]
    fn test_strict_bad_score_string_keeps_feedback() {
        let reply = r#"{"feedback": "Neat handwriting", "score": "seventeen out of twenty"}"#;
        let result = parse_reply(reply, OutputMode::Strict);

        assert_eq!(result.feedback, "Neat handwriting");
        assert!(matches!(result.status, ScoreStatus::Invalid(_)));
        assert_eq!(result.mark(), "unscored");
    }

    #[test]
    fn test_strict_out_of_range_is_flagged_not_dropped() {
        let reply = r#"{"feedback": "Everything correct and more", "score": "21/20"}"#;
        let result = parse_reply(reply, OutputMode::Strict);

        assert_eq!(result.feedback, "Everything correct and more");
        assert!(matches!(result.status, ScoreStatus::Invalid(_)));
    }

    #[test]
    fn test_lenient_trailing_marker() {
        let text = "Question 3 was wrong because of a sign error.\n\nSCORE: 9/10";
        let result = parse_reply(text, OutputMode::Lenient);

        assert_eq!(result.score, Score::new(9, 10));
        assert!(result.status.is_valid());
        assert_eq!(result.feedback, text);
    }

    #[test]
    fn test_lenient_takes_last_marker() {
        let text = "Last week you got SCORE: 5/10. This time:\nSCORE: 8/10";
        let result = parse_reply(text, OutputMode::Lenient);
        assert_eq!(result.score, Score::new(8, 10));
    }

    #[test]
    fn test_lenient_no_marker_keeps_feedback() {
        let text = "You did well overall but I cannot give a number.";
        let result = parse_reply(text, OutputMode::Lenient);

        assert_eq!(result.status, ScoreStatus::Unscored);
        assert_eq!(result.score, Score::unscored());
        assert_eq!(result.feedback, text);
    }

    #[test]
    fn test_parse_score_string() {
        assert_eq!(parse_score_string("17/20"), Some(Score::new(17, 20)));
        assert_eq!(parse_score_string(" 9 / 10 "), Some(Score::new(9, 10)));
        assert_eq!(parse_score_string("9-10"), None);
        assert_eq!(parse_score_string("a/b"), None);
    }
}
