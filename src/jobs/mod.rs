//! Job orchestration
//!
//! This module provides:
//! - Prompt batch parsing
//! - `JobOrchestrator` for concurrent generation and alignment jobs
//! - `JobEvent` completion reports

mod events;
mod orchestrator;
mod prompts;

pub use events::JobEvent;
pub use orchestrator::{
    classify_alignment_failure, classify_generation_failure, JobOrchestrator, AUTH_FAILURE_MESSAGE,
};
pub use prompts::split_prompts;
