use std::fmt;

use serde::{Deserialize, Serialize};

/// How the backend is asked to format its reply, and how the reply is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Structured JSON object with required `feedback` and `score` fields.
    Strict,
    /// Free text ending in a literal `SCORE: N/M` marker.
    Lenient,
}

/// A mark as a numerator/denominator pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub numerator: u32,
    pub denominator: u32,
}

impl Score {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Sentinel used when no score could be extracted from the reply.
    pub fn unscored() -> Self {
        Self::new(0, 0)
    }

    /// Check the score against the validity contract:
    /// `numerator <= denominator` and `denominator > 0`.
    pub fn validate(&self) -> ScoreStatus {
        if self.denominator == 0 {
            ScoreStatus::Invalid("denominator must be greater than zero".to_string())
        } else if self.numerator > self.denominator {
            ScoreStatus::Invalid(format!(
                "numerator {} exceeds denominator {}",
                self.numerator, self.denominator
            ))
        } else {
            ScoreStatus::Valid
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Validity of an extracted score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreStatus {
    /// Score extracted and within range.
    Valid,
    /// No score marker found in the reply; the sentinel score is attached.
    Unscored,
    /// Score extracted but out of range. Kept for manual review, never
    /// silently dropped.
    Invalid(String),
}

impl ScoreStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, ScoreStatus::Valid)
    }
}

/// Outcome of one grading invocation (or the aggregate over several passes).
#[derive(Debug, Clone)]
pub struct GradingResult {
    /// Full feedback text from the backend. Always populated, even when the
    /// score is missing or invalid.
    pub feedback: String,
    pub score: Score,
    pub status: ScoreStatus,
}

impl GradingResult {
    /// The mark string recorded in the gradebook: `"N/M"` when a score was
    /// extracted, the `"unscored"` sentinel when none was.
    pub fn mark(&self) -> String {
        if self.score == Score::unscored() {
            "unscored".to_string()
        } else {
            self.score.to_string()
        }
    }
}

/// One persisted gradebook row. Field names match the stored table columns.
///
/// `Mark` is normally an `"N/M"` string; runs where no score could be
/// extracted record the literal `"unscored"` instead, so snapshot consumers
/// must accept both forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradebookRow {
    #[serde(rename = "Student")]
    pub student: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Mark")]
    pub mark: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_valid() {
        assert!(Score::new(17, 20).validate().is_valid());
        assert!(Score::new(0, 20).validate().is_valid());
        assert!(Score::new(20, 20).validate().is_valid());
    }

    #[test]
    fn test_score_zero_denominator_invalid() {
        let status = Score::new(5, 0).validate();
        assert!(matches!(status, ScoreStatus::Invalid(_)));
    }

    #[test]
    fn test_score_numerator_over_denominator_invalid() {
        let status = Score::new(21, 20).validate();
        assert!(matches!(status, ScoreStatus::Invalid(_)));
    }

    #[test]
    fn test_mark_string() {
        let result = GradingResult {
            feedback: "Well done".to_string(),
            score: Score::new(17, 20),
            status: ScoreStatus::Valid,
        };
        assert_eq!(result.mark(), "17/20");

        let unscored = GradingResult {
            feedback: "No score given".to_string(),
            score: Score::unscored(),
            status: ScoreStatus::Unscored,
        };
        assert_eq!(unscored.mark(), "unscored");

        // A malformed reply is invalid with the sentinel score; it must not
        // record a literal 0/0 mark.
        let malformed = GradingResult {
            feedback: "raw reply text".to_string(),
            score: Score::unscored(),
            status: ScoreStatus::Invalid("not the required shape".to_string()),
        };
        assert_eq!(malformed.mark(), "unscored");

        // An out-of-range score keeps its literal mark for review.
        let out_of_range = GradingResult {
            feedback: "generous".to_string(),
            score: Score::new(21, 20),
            status: ScoreStatus::Invalid("numerator exceeds denominator".to_string()),
        };
        assert_eq!(out_of_range.mark(), "21/20");
    }
}
