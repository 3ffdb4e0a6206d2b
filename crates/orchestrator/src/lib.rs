mod orchestrator;
mod outcome;


pub use orchestrator::{build_messages, ChatOptions, ChatOrchestrator};
pub use outcome::TurnOutcome;
