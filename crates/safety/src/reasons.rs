//! Turns scanner detection flags into the rationale shown to a user.

use chatgate_common::{BlockReasonMode, RationaleLocale};
use serde_json::Value;
use tracing::warn;

/// Detection categories reported by the scanning service, plus the two fallbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockCategory {
    Dlp,
    Injection,
    MaliciousCode,
    TopicViolation,
    ToxicContent,
    UrlCats,
    /// Blocked, but no known category was flagged
    Other,
    /// The flags could not be read at all
    Unknown,
}

impl BlockCategory {
    /// Known categories in resolution priority order
    pub const PRIORITY: [BlockCategory; 6] = [
        BlockCategory::Dlp,
        BlockCategory::Injection,
        BlockCategory::MaliciousCode,
        BlockCategory::TopicViolation,
        BlockCategory::ToxicContent,
        BlockCategory::UrlCats,
    ];

    /// Key used in `prompt_detected` / `response_detected`
    pub fn key(&self) -> &'static str {
        match self {
            BlockCategory::Dlp => "dlp",
            BlockCategory::Injection => "injection",
            BlockCategory::MaliciousCode => "malicious_code",
            BlockCategory::TopicViolation => "topic_violation",
            BlockCategory::ToxicContent => "toxic_content",
            BlockCategory::UrlCats => "url_cats",
            BlockCategory::Other => "other",
            BlockCategory::Unknown => "unknown",
        }
    }

    pub fn rationale(&self, locale: RationaleLocale) -> &'static str {
        match locale {
            RationaleLocale::En => match self {
                BlockCategory::Dlp => "data protection policy violation",
                BlockCategory::Injection => "prompt injection detected",
                BlockCategory::MaliciousCode => "malicious code detected",
                BlockCategory::TopicViolation => "topic not allowed",
                BlockCategory::ToxicContent => "toxic content detected",
                BlockCategory::UrlCats => "suspicious URL detected",
                BlockCategory::Other => "other",
                BlockCategory::Unknown => "unknown",
            },
            RationaleLocale::De => match self {
                BlockCategory::Dlp => "Verletzung der Datenschutzrichtlinien",
                BlockCategory::Injection => "Injection erkannt",
                BlockCategory::MaliciousCode => "Schadcode erkannt",
                BlockCategory::TopicViolation => "Thema nicht erlaubt",
                BlockCategory::ToxicContent => "Schadhafter Content erkannt",
                BlockCategory::UrlCats => "Verdächtige URL erkannt",
                BlockCategory::Other => "Sonstiges",
                BlockCategory::Unknown => "Unbekannt",
            },
        }
    }
}

/// Flagged categories in priority order.
///
/// `None` and JSON `null` have nothing flagged. Anything that is not an object
/// is rejected. Only a literal `true` counts as flagged.
pub fn flagged_categories(flags: Option<&Value>) -> Result<Vec<BlockCategory>, String> {
    let map = match flags {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(map)) => map,
        Some(other) => return Err(format!("detection flags are not an object: {}", other)),
    };

    Ok(BlockCategory::PRIORITY
        .into_iter()
        .filter(|category| map.get(category.key()) == Some(&Value::Bool(true)))
        .collect())
}

/// Rationale for a block verdict. Never empty, never fails.
pub fn resolve(flags: Option<&Value>, mode: BlockReasonMode, locale: RationaleLocale) -> String {
    let flagged = match flagged_categories(flags) {
        Ok(flagged) => flagged,
        Err(e) => {
            warn!("Could not determine block reason: {}", e);
            return BlockCategory::Unknown.rationale(locale).to_string();
        }
    };

    match (mode, flagged.as_slice()) {
        (_, []) => BlockCategory::Other.rationale(locale).to_string(),
        (BlockReasonMode::FirstMatch, [first, ..]) => first.rationale(locale).to_string(),
        (BlockReasonMode::AllMatches, all) => all
            .iter()
            .map(|category| category.rationale(locale))
            .collect::<Vec<_>>()
            .join(", "),
    }
}
