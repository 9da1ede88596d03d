mod client;

pub use client::{GeminiClient, GeminiConfig, SUPPORTED_MODELS};
