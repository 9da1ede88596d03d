pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod reference;
pub mod store;

pub use error::MarkError;
pub use llm::{GeminiClient, GeminiConfig, SUPPORTED_MODELS};
pub use models::{
    GradebookRow, GradingResult, MediaKind, OutputMode, Page, PagePayload, Score, ScoreStatus,
    Submission,
};
pub use pipeline::{GradingRequest, InvokerConfig, PipelineConfig, RubricConfig, grade_submission};
pub use reference::{KeyResolver, KeySource, ReferenceKey};
pub use store::Gradebook;
