//! 核心编排层：错误、状态投影、单轮流水线、主控循环

pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod state;

pub use error::ChatError;
pub use orchestrator::{spawn_runtime, ChatRuntime, Command};
pub use pipeline::{process_response, run_turn};
pub use state::{ChatPhase, UiState};
