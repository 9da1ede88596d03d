use crate::error::MarkError;

/// Declared media category of an uploaded page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// A raster image (photo or scan of a worksheet page).
    Raster,
    /// A paginated document (PDF), passed through without decomposition.
    Document,
}

/// One raw uploaded page, owned by exactly one submission.
#[derive(Debug, Clone)]
pub struct Page {
    /// Raw bytes as uploaded - never mutated by the pipeline.
    pub bytes: Vec<u8>,
    /// Declared media category.
    pub kind: MediaKind,
    /// Position within the submission's page order.
    pub ordinal: usize,
}

/// A normalized page payload in a form the backend accepts.
#[derive(Debug, Clone)]
pub struct PagePayload {
    pub bytes: Vec<u8>,
    /// Concrete MIME type of `bytes` (e.g. "image/jpeg", "application/pdf").
    pub mime_type: String,
}

/// One student's set of uploaded pages for a single grading attempt.
///
/// Lives for one pipeline run and is discarded afterwards; nothing from a
/// submission is held across runs.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Identifier for log correlation across pipeline stages (UUID).
    pub submission_id: String,
    /// Non-empty student identifier.
    pub student: String,
    /// Ordered pages, at least one.
    pub pages: Vec<Page>,
}

impl Submission {
    /// Create a submission, enforcing the non-empty-student and at-least-one
    /// page invariants up front.
    pub fn new(student: &str, pages: Vec<Page>) -> Result<Self, MarkError> {
        let student = student.trim();
        if student.is_empty() {
            return Err(MarkError::Input {
                ordinal: 0,
                reason: "student identifier must not be empty".to_string(),
            });
        }
        if pages.is_empty() {
            return Err(MarkError::Input {
                ordinal: 0,
                reason: "submission must contain at least one page".to_string(),
            });
        }

        Ok(Self {
            submission_id: uuid::Uuid::new_v4().to_string(),
            student: student.to_string(),
            pages,
        })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}
