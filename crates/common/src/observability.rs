use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use serde::Serialize;
use uuid::Uuid;

const MAX_SAMPLES: usize = 10000;

/// Request correlation ID for tracing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(Arc<str>);

impl Serialize for RequestId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string().into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal outcome of one chat turn, as counted by metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    Answered,
    PromptBlocked,
    ResponseBlocked,
    ScanUnavailable,
    GenerationFiltered,
    GenerationFailed,
    EmptyPrompt,
}

impl TurnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnKind::Answered => "answered",
            TurnKind::PromptBlocked => "prompt_blocked",
            TurnKind::ResponseBlocked => "response_blocked",
            TurnKind::ScanUnavailable => "scan_unavailable",
            TurnKind::GenerationFiltered => "generation_filtered",
            TurnKind::GenerationFailed => "generation_failed",
            TurnKind::EmptyPrompt => "empty_prompt",
        }
    }
}

/// Store faults that degrade a turn without failing it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFault {
    Read,
    Persist,
}

/// Counters and latencies for the chat pipeline
#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    inner: Arc<RwLock<MetricsData>>,
    start_time: Instant,
}

#[derive(Debug, Default)]
struct MetricsData {
    total_turns: u64,
    turns_by_kind: HashMap<TurnKind, u64>,
    turn_durations: VecDeque<u64>,

    context_read_failures: u64,
    persist_failures: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MetricsData::default())),
            start_time: Instant::now(),
        }
    }

    /// Record a finished turn
    pub async fn record_turn(&self, kind: TurnKind, duration_ms: u64) {
        let mut data = self.inner.write().await;

        data.total_turns += 1;
        *data.turns_by_kind.entry(kind).or_insert(0) += 1;

        data.turn_durations.push_back(duration_ms);
        if data.turn_durations.len() > MAX_SAMPLES {
            data.turn_durations.pop_front();
        }
    }

    /// Record a fail-open store fault
    pub async fn record_store_fault(&self, fault: StoreFault) {
        let mut data = self.inner.write().await;
        match fault {
            StoreFault::Read => data.context_read_failures += 1,
            StoreFault::Persist => data.persist_failures += 1,
        }
    }

    /// Calculate percentile from samples
    fn calculate_percentile(samples: &[u64], percentile: f64) -> u64 {
        if samples.is_empty() {
            return 0;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let index = ((percentile / 100.0) * (sorted.len() - 1) as f64) as usize;
        sorted[index]
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let data = self.inner.read().await;
        let durations: Vec<u64> = data.turn_durations.iter().copied().collect();
        let count = |kind: TurnKind| data.turns_by_kind.get(&kind).copied().unwrap_or(0);

        MetricsSnapshot {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            uptime_seconds: self.start_time.elapsed().as_secs(),

            total_turns: data.total_turns,
            answered: count(TurnKind::Answered),
            prompts_blocked: count(TurnKind::PromptBlocked),
            responses_blocked: count(TurnKind::ResponseBlocked),
            scan_failures: count(TurnKind::ScanUnavailable),
            generation_filtered: count(TurnKind::GenerationFiltered),
            generation_failures: count(TurnKind::GenerationFailed),
            empty_prompts: count(TurnKind::EmptyPrompt),

            context_read_failures: data.context_read_failures,
            persist_failures: data.persist_failures,

            turn_duration_p50_ms: Self::calculate_percentile(&durations, 50.0),
            turn_duration_p95_ms: Self::calculate_percentile(&durations, 95.0),
            turn_duration_p99_ms: Self::calculate_percentile(&durations, 99.0),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics snapshot for /metrics endpoint
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: u64,
    pub uptime_seconds: u64,

    // Turn outcomes
    pub total_turns: u64,
    pub answered: u64,
    pub prompts_blocked: u64,
    pub responses_blocked: u64,
    pub scan_failures: u64,
    pub generation_filtered: u64,
    pub generation_failures: u64,
    pub empty_prompts: u64,

    // Degraded but answered
    pub context_read_failures: u64,
    pub persist_failures: u64,

    // Latency percentiles (milliseconds)
    pub turn_duration_p50_ms: u64,
    pub turn_duration_p95_ms: u64,
    pub turn_duration_p99_ms: u64,
}
