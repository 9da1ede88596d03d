use crate::models::{OutputMode, PagePayload, Submission};
use crate::reference::ReferenceKey;

/// Marking rubric applied to every submission (non-negotiable rules).
const RUBRIC: &str = r#"You are a Math teacher marking a math worksheet. You MUST follow these rules:

1. Mark the student's answers against the attached memorandum ONLY. An answer earns full marks only if it exactly matches the memorandum.
2. Award no partial credit unless the memorandum explicitly allows it.
3. List every correct answer, and every mistake with a short explanation of why it is wrong.
4. Address the student by name in your feedback.
5. Do not invent questions or answers that are not on the worksheet."#;

/// Configuration for request construction.
#[derive(Debug, Clone)]
pub struct RubricConfig {
    /// Reply format the backend is instructed to produce.
    pub mode: OutputMode,
}

impl Default for RubricConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::Strict,
        }
    }
}

/// One fully assembled grading request.
///
/// The instruction text is a pure function of the submission, the reference
/// key and the rubric config: repeat builds with identical inputs are
/// byte-identical, so any variance in grading outcomes originates in the
/// backend's own sampling.
#[derive(Debug, Clone)]
pub struct GradingRequest {
    /// Deterministic instruction text.
    pub instruction: String,
    /// Answer-key payload followed by the student's pages in upload order.
    pub payloads: Vec<PagePayload>,
}

/// Build the grading request for one submission.
///
/// The instruction contains the student identifier exactly once and the
/// reference-key pointer exactly once, in a fixed template.
pub fn build_request(
    submission: &Submission,
    key: &ReferenceKey,
    pages: Vec<PagePayload>,
    config: &RubricConfig,
) -> GradingRequest {
    let mut instruction = String::new();

    instruction.push_str(RUBRIC);
    instruction.push_str("\n\n");
    instruction.push_str(&format!("Student: {}\n", submission.student));
    instruction.push_str(&format!("Memorandum: {}\n", key.pointer));
    instruction.push_str(
        "The first attached document is the memorandum. The remaining attachments are the student's worksheet pages, in order.\n\n",
    );

    instruction.push_str("## Required output\n");
    match config.mode {
        OutputMode::Strict => {
            instruction.push_str(
                "Reply with a single JSON object with exactly two fields:\n\
                 - \"feedback\": your full feedback as text\n\
                 - \"score\": the total mark as \"<earned>/<possible>\", e.g. \"17/20\"\n",
            );
        }
        OutputMode::Lenient => {
            instruction.push_str(
                "Write your full feedback as plain text, then end your reply with a final line of the form:\n\
                 SCORE: <earned>/<possible>\n",
            );
        }
    }

    let mut payloads_with_key = Vec::with_capacity(pages.len() + 1);
    payloads_with_key.push(PagePayload {
        bytes: key.bytes.clone(),
        mime_type: key.mime_type.clone(),
    });
    payloads_with_key.extend(pages);

    GradingRequest {
        instruction,
        payloads: payloads_with_key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaKind, Page};

    fn submission(student: &str) -> Submission {
        Submission::new(
            student,
            vec![Page {
                bytes: vec![1, 2, 3],
                kind: MediaKind::Raster,
                ordinal: 0,
            }],
        )
        .unwrap()
    }

    fn key() -> ReferenceKey {
        ReferenceKey {
            pointer: "keys/term2-memo.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            bytes: b"memo".to_vec(),
        }
    }

    fn payloads() -> Vec<PagePayload> {
        vec![PagePayload {
            bytes: vec![9, 9, 9],
            mime_type: "image/jpeg".to_string(),
        }]
    }

    #[test]
    fn test_instruction_contains_student_and_pointer_exactly_once() {
        let submission = submission("ALICE-7734");
        let request = build_request(&submission, &key(), payloads(), &RubricConfig::default());

        assert_eq!(request.instruction.matches("ALICE-7734").count(), 1);
        assert_eq!(request.instruction.matches("keys/term2-memo.pdf").count(), 1);
    }

    #[test]
    fn test_build_is_deterministic() {
        let submission = submission("Bob");
        let config = RubricConfig::default();

        let a = build_request(&submission, &key(), payloads(), &config);
        let b = build_request(&submission, &key(), payloads(), &config);

        assert_eq!(a.instruction, b.instruction);
        assert_eq!(a.payloads.len(), b.payloads.len());
    }

    #[test]
    fn test_key_payload_comes_first() {
        let submission = submission("Bob");
        let request = build_request(&submission, &key(), payloads(), &RubricConfig::default());

        assert_eq!(request.payloads.len(), 2);
        assert_eq!(request.payloads[0].mime_type, "application/pdf");
        assert_eq!(request.payloads[1].mime_type, "image/jpeg");
    }

    #[test]
    fn test_mode_selects_schema_section() {
        let submission = submission("Bob");

        let strict = build_request(
            &submission,
            &key(),
            payloads(),
            &RubricConfig {
                mode: OutputMode::Strict,
            },
        );
        assert!(strict.instruction.contains("JSON object"));

        let lenient = build_request(
            &submission,
            &key(),
            payloads(),
            &RubricConfig {
                mode: OutputMode::Lenient,
            },
        );
        assert!(lenient.instruction.contains("SCORE: <earned>/<possible>"));
    }
}
