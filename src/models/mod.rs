mod grade;
mod submission;

pub use grade::{GradebookRow, GradingResult, OutputMode, Score, ScoreStatus};
pub use submission::{MediaKind, Page, PagePayload, Submission};
