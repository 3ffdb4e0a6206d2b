use crate::TurnOutcome;
use chatgate_common::{
    BlockReasonMode, ConversationRecord, ConversationTurn, Message, PipelineMetrics,
    RationaleLocale, StoreFault,
};
use chatgate_config::AppConfig;
use chatgate_runtime::ModelBackend;
use chatgate_safety::{ScanVerdict, Scanner};
use chatgate_store::ConversationStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Per-process chat settings
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Previous turns included as context
    pub history_limit: usize,
    pub reason_mode: BlockReasonMode,
    pub locale: RationaleLocale,
    /// Leading system message, if any
    pub system_prompt: Option<String>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            history_limit: 10,
            reason_mode: BlockReasonMode::FirstMatch,
            locale: RationaleLocale::En,
            system_prompt: None,
        }
    }
}

impl From<&AppConfig> for ChatOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            history_limit: config.chat.history_limit,
            reason_mode: config.safety.reason_mode,
            locale: config.safety.locale,
            system_prompt: config.chat.system_prompt.clone(),
        }
    }
}

/// Stages of a turn, in order. Scan stages are skipped when scanning is off.
#[derive(Debug)]
enum Stage {
    FetchContext,
    ScanPrompt { messages: Vec<Message> },
    Generate { messages: Vec<Message> },
    ScanResponse { response: String },
    Persist { response: String },
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::FetchContext => "fetch_context",
            Stage::ScanPrompt { .. } => "scan_prompt",
            Stage::Generate { .. } => "generate",
            Stage::ScanResponse { .. } => "scan_response",
            Stage::Persist { .. } => "persist",
        }
    }
}

enum Step {
    Next(Stage),
    Done(TurnOutcome),
}

struct Turn<'a> {
    conversation_id: &'a str,
    prompt: &'a str,
}

/// Ordered model input: the system prompt, stored turns oldest first, then the
/// new prompt.
///
/// `history` is newest first, as returned by the store.
pub fn build_messages(
    system_prompt: Option<&str>,
    history: &[ConversationTurn],
    prompt: &str,
) -> Vec<Message> {
    let mut messages: Vec<Message> = system_prompt.map(Message::system).into_iter().collect();
    messages.extend(history.iter().rev().flat_map(ConversationTurn::to_messages));
    messages.push(Message::user(prompt));
    messages
}

/// Runs one chat turn through context, scanning, generation and persistence
pub struct ChatOrchestrator {
    backend: Arc<dyn ModelBackend>,
    store: Arc<dyn ConversationStore>,
    scanner: Arc<dyn Scanner>,
    scanning_enabled: bool,
    options: ChatOptions,
    metrics: Option<PipelineMetrics>,
}

impl ChatOrchestrator {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        store: Arc<dyn ConversationStore>,
        scanner: Arc<dyn Scanner>,
        options: ChatOptions,
    ) -> Self {
        let scanning_enabled = scanner.enabled();
        if scanning_enabled {
            info!("Safety scanning enabled for prompts and responses");
        } else {
            warn!("Safety scanning disabled: no safety profile id configured");
        }

        Self {
            backend,
            store,
            scanner,
            scanning_enabled,
            options,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: PipelineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn scanning_enabled(&self) -> bool {
        self.scanning_enabled
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    /// Answer a prompt. Every failure resolves to a user-facing message.
    pub async fn chat(&self, conversation_id: &str, prompt: &str) -> String {
        self.run_turn(conversation_id, prompt).await.into_message()
    }

    /// Run one turn and report how it ended
    pub async fn run_turn(&self, conversation_id: &str, prompt: &str) -> TurnOutcome {
        let started = Instant::now();

        let outcome = if prompt.trim().is_empty() {
            TurnOutcome::EmptyPrompt
        } else {
            let turn = Turn {
                conversation_id,
                prompt,
            };
            let mut stage = Stage::FetchContext;
            loop {
                debug!(conversation_id, stage = stage.name(), "Entering stage");
                match self.advance(&turn, stage).await {
                    Step::Next(next) => stage = next,
                    Step::Done(outcome) => break outcome,
                }
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            conversation_id,
            outcome = outcome.kind().as_str(),
            elapsed_ms,
            "Chat turn finished"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_turn(outcome.kind(), elapsed_ms).await;
        }

        outcome
    }

    async fn advance(&self, turn: &Turn<'_>, stage: Stage) -> Step {
        match stage {
            Stage::FetchContext => {
                let messages = self.fetch_context(turn).await;
                if self.scanning_enabled {
                    Step::Next(Stage::ScanPrompt { messages })
                } else {
                    Step::Next(Stage::Generate { messages })
                }
            }
            Stage::ScanPrompt { messages } => {
                match self.scanner.scan_prompt(turn.conversation_id, turn.prompt).await {
                    Ok(verdict) => match self.block_rationale(&verdict) {
                        Some(rationale) => {
                            info!(
                                conversation_id = turn.conversation_id,
                                scan_id = verdict.scan_id.as_deref().unwrap_or(""),
                                category = verdict.category.as_deref().unwrap_or(""),
                                "Prompt blocked: {}",
                                rationale
                            );
                            Step::Done(TurnOutcome::PromptBlocked { rationale })
                        }
                        None => Step::Next(Stage::Generate { messages }),
                    },
                    Err(e) => {
                        error!(
                            conversation_id = turn.conversation_id,
                            "Prompt scan failed: {}", e
                        );
                        Step::Done(TurnOutcome::ScanUnavailable)
                    }
                }
            }
            Stage::Generate { messages } => match self.backend.complete(&messages).await {
                Ok(response) if response.is_empty() => {
                    error!(
                        conversation_id = turn.conversation_id,
                        "Model returned an empty completion"
                    );
                    Step::Done(TurnOutcome::GenerationFailed)
                }
                Ok(response) => {
                    if self.scanning_enabled {
                        Step::Next(Stage::ScanResponse { response })
                    } else {
                        Step::Next(Stage::Persist { response })
                    }
                }
                Err(e) if e.is_content_filtered() => {
                    warn!(
                        conversation_id = turn.conversation_id,
                        "Generation filtered by provider: {}", e
                    );
                    Step::Done(TurnOutcome::GenerationFiltered)
                }
                Err(e) => {
                    error!(
                        conversation_id = turn.conversation_id,
                        "Generation failed: {}", e
                    );
                    Step::Done(TurnOutcome::GenerationFailed)
                }
            },
            Stage::ScanResponse { response } => {
                match self
                    .scanner
                    .scan_response(turn.conversation_id, turn.prompt, &response)
                    .await
                {
                    Ok(verdict) => match self.block_rationale(&verdict) {
                        Some(rationale) => {
                            info!(
                                conversation_id = turn.conversation_id,
                                scan_id = verdict.scan_id.as_deref().unwrap_or(""),
                                category = verdict.category.as_deref().unwrap_or(""),
                                "Response blocked: {}",
                                rationale
                            );
                            Step::Done(TurnOutcome::ResponseBlocked { rationale })
                        }
                        None => Step::Next(Stage::Persist { response }),
                    },
                    Err(e) => {
                        error!(
                            conversation_id = turn.conversation_id,
                            "Response scan failed: {}", e
                        );
                        Step::Done(TurnOutcome::ScanUnavailable)
                    }
                }
            }
            Stage::Persist { response } => {
                self.persist(turn, &response).await;
                Step::Done(TurnOutcome::Answered(response))
            }
        }
    }

    /// Store faults leave the turn with no memory rather than failing it
    async fn fetch_context(&self, turn: &Turn<'_>) -> Vec<Message> {
        let history = match self
            .store
            .read_recent(turn.conversation_id, self.options.history_limit)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                warn!(
                    conversation_id = turn.conversation_id,
                    "Could not load conversation history, continuing without it: {}", e
                );
                self.record_store_fault(StoreFault::Read).await;
                Vec::new()
            }
        };

        debug!(
            conversation_id = turn.conversation_id,
            turns = history.len(),
            "Loaded conversation context"
        );
        build_messages(self.options.system_prompt.as_deref(), &history, turn.prompt)
    }

    /// Best effort; the user still gets the approved response
    async fn persist(&self, turn: &Turn<'_>, response: &str) {
        let record = ConversationRecord::new(turn.conversation_id, turn.prompt, response);
        if let Err(e) = self.store.append(&record).await {
            warn!(
                conversation_id = turn.conversation_id,
                record_id = %record.id,
                "Could not persist chat turn: {}", e
            );
            self.record_store_fault(StoreFault::Persist).await;
        }
    }

    fn block_rationale(&self, verdict: &ScanVerdict) -> Option<String> {
        verdict.rationale(self.options.reason_mode, self.options.locale)
    }

    async fn record_store_fault(&self, fault: StoreFault) {
        if let Some(metrics) = &self.metrics {
            metrics.record_store_fault(fault).await;
        }
    }
}
