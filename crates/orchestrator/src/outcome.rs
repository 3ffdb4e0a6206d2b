use chatgate_common::TurnKind;

pub const SCAN_UNAVAILABLE: &str = "Your request could not be processed. Please try again later.";
pub const GENERATION_FILTERED: &str =
    "The response was filtered due to the prompt triggering the model-native security policy.";
pub const GENERATION_FAILED: &str =
    "I encountered an error while processing your request. Please try again later...";
pub const EMPTY_PROMPT: &str = "Please enter a message.";

/// How a chat turn ended. Every variant maps to text safe to show a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Generated, approved and (best-effort) persisted
    Answered(String),
    PromptBlocked { rationale: String },
    ResponseBlocked { rationale: String },
    /// The scanner could not be reached or answered nonsense
    ScanUnavailable,
    /// The model provider refused under its own content policy
    GenerationFiltered,
    GenerationFailed,
    EmptyPrompt,
}

impl TurnOutcome {
    pub fn kind(&self) -> TurnKind {
        match self {
            TurnOutcome::Answered(_) => TurnKind::Answered,
            TurnOutcome::PromptBlocked { .. } => TurnKind::PromptBlocked,
            TurnOutcome::ResponseBlocked { .. } => TurnKind::ResponseBlocked,
            TurnOutcome::ScanUnavailable => TurnKind::ScanUnavailable,
            TurnOutcome::GenerationFiltered => TurnKind::GenerationFiltered,
            TurnOutcome::GenerationFailed => TurnKind::GenerationFailed,
            TurnOutcome::EmptyPrompt => TurnKind::EmptyPrompt,
        }
    }

    /// Text returned to the user
    pub fn into_message(self) -> String {
        match self {
            TurnOutcome::Answered(text) => text,
            TurnOutcome::PromptBlocked { rationale } => {
                format!("Your request was blocked: {}", rationale)
            }
            TurnOutcome::ResponseBlocked { rationale } => {
                format!("The assistant's answer was blocked: {}", rationale)
            }
            TurnOutcome::ScanUnavailable => SCAN_UNAVAILABLE.to_string(),
            TurnOutcome::GenerationFiltered => GENERATION_FILTERED.to_string(),
            TurnOutcome::GenerationFailed => GENERATION_FAILED.to_string(),
            TurnOutcome::EmptyPrompt => EMPTY_PROMPT.to_string(),
        }
    }
}
