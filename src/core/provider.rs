//! Canonical provider identifiers and normalization rules.
//!
//! Credential files and model records both describe their upstream with free
//! text ("anthropic", "gemini-cli", "gpt-4o"). The tables below reduce that
//! text to a closed set of [`Provider`] ids. Each table is evaluated top to
//! bottom and the first matching rule wins, so rule order is part of the
//! behavior: `openai-compat` must be tested before the `openai` keyword of
//! the codex rule, for example.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Provider Enum
// =============================================================================

/// Canonical upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "claude")]
    Claude,
    #[serde(rename = "codex")]
    Codex,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "qwen")]
    Qwen,
    #[serde(rename = "iflow")]
    Iflow,
    #[serde(rename = "openai-compat")]
    OpenAiCompat,
    #[serde(rename = "proxy-access")]
    ProxyAccess,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Provider {
    /// All providers in canonical display order.
    pub const ALL: &'static [Self] = &[
        Self::Claude,
        Self::Codex,
        Self::Gemini,
        Self::Qwen,
        Self::Iflow,
        Self::OpenAiCompat,
        Self::ProxyAccess,
        Self::Unknown,
    ];

    /// Stable identifier used in JSON and URLs.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::Gemini => "gemini",
            Self::Qwen => "qwen",
            Self::Iflow => "iflow",
            Self::OpenAiCompat => "openai-compat",
            Self::ProxyAccess => "proxy-access",
            Self::Unknown => "unknown",
        }
    }

    /// Exact lookup by identifier.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.id() == id)
    }

    /// Position in canonical display order.
    #[must_use]
    pub fn rank(self) -> usize {
        Self::ALL.iter().position(|p| *p == self).unwrap_or(Self::ALL.len())
    }

    /// Ids that say nothing about which upstream actually serves a model.
    #[must_use]
    pub const fn is_fallback(self) -> bool {
        matches!(self, Self::Unknown | Self::ProxyAccess | Self::OpenAiCompat)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// =============================================================================
// Rule Tables
// =============================================================================

/// A classification rule: predicate over lower-cased text, and its result.
pub type Rule = (fn(&str) -> bool, Provider);

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| text.contains(needle))
}

fn mentions_proxy_access(text: &str) -> bool {
    contains_any(text, &["proxy-access", "proxy_access", "access-key", "api-keys"])
}

fn mentions_openai_compat(text: &str) -> bool {
    contains_any(text, &["openai-compat", "openai_compat", "compatibility"])
}

fn mentions_claude(text: &str) -> bool {
    contains_any(text, &["claude", "anthropic"])
}

fn mentions_gemini(text: &str) -> bool {
    contains_any(text, &["gemini", "google", "vertex", "aistudio"])
}

fn mentions_qwen(text: &str) -> bool {
    contains_any(text, &["qwen", "dashscope", "alibaba"])
}

fn mentions_iflow(text: &str) -> bool {
    text.contains("iflow")
}

fn mentions_codex(text: &str) -> bool {
    contains_any(text, &["codex", "openai", "gpt"])
}

fn is_codex_family_model(id: &str) -> bool {
    contains_any(id, &["gpt", "codex", "davinci"])
        || ["o1", "o3", "o4"].iter().any(|prefix| id.starts_with(prefix))
}

/// Rules for provider/type hints in credential files and owner labels.
pub const HINT_RULES: &[Rule] = &[
    (mentions_proxy_access, Provider::ProxyAccess),
    (mentions_openai_compat, Provider::OpenAiCompat),
    (mentions_claude, Provider::Claude),
    (mentions_gemini, Provider::Gemini),
    (mentions_qwen, Provider::Qwen),
    (mentions_iflow, Provider::Iflow),
    (mentions_codex, Provider::Codex),
];

/// Rules for bare model ids.
pub const MODEL_ID_RULES: &[Rule] = &[
    (mentions_claude, Provider::Claude),
    (mentions_gemini, Provider::Gemini),
    (mentions_qwen, Provider::Qwen),
    (mentions_iflow, Provider::Iflow),
    (is_codex_family_model, Provider::Codex),
];

/// Evaluate a rule table against `text`; first match wins.
#[must_use]
pub fn classify(rules: &[Rule], text: &str) -> Option<Provider> {
    let lower = text.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }
    rules
        .iter()
        .find(|(matches, _)| matches(&lower))
        .map(|(_, provider)| *provider)
}

/// Normalize a free-text provider hint. Unmatched text is [`Provider::Unknown`].
#[must_use]
pub fn normalize_hint(text: &str) -> Provider {
    classify(HINT_RULES, text).unwrap_or(Provider::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_keywords_map_to_canonical_ids() {
        assert_eq!(normalize_hint("claude"), Provider::Claude);
        assert_eq!(normalize_hint("Anthropic"), Provider::Claude);
        assert_eq!(normalize_hint("gemini-cli"), Provider::Gemini);
        assert_eq!(normalize_hint("qwen"), Provider::Qwen);
        assert_eq!(normalize_hint("iflow"), Provider::Iflow);
        assert_eq!(normalize_hint("codex"), Provider::Codex);
        assert_eq!(normalize_hint("OpenAI"), Provider::Codex);
        assert_eq!(normalize_hint("something-else"), Provider::Unknown);
        assert_eq!(normalize_hint(""), Provider::Unknown);
    }

    #[test]
    fn compat_wins_over_openai_keyword() {
        assert_eq!(normalize_hint("openai-compatibility"), Provider::OpenAiCompat);
        assert_eq!(normalize_hint("openai_compat"), Provider::OpenAiCompat);
    }

    #[test]
    fn proxy_access_is_checked_first() {
        assert_eq!(normalize_hint("proxy-access-claude"), Provider::ProxyAccess);
    }

    #[test]
    fn file_name_fallback_works() {
        assert_eq!(normalize_hint("claude-user@example.com.json"), Provider::Claude);
        assert_eq!(normalize_hint("codex-abc123.json"), Provider::Codex);
    }

    #[test]
    fn model_id_rules_follow_fixed_order() {
        assert_eq!(classify(MODEL_ID_RULES, "claude-sonnet-4"), Some(Provider::Claude));
        assert_eq!(classify(MODEL_ID_RULES, "gemini-2.5-pro"), Some(Provider::Gemini));
        assert_eq!(classify(MODEL_ID_RULES, "qwen3-coder-plus"), Some(Provider::Qwen));
        assert_eq!(classify(MODEL_ID_RULES, "gpt-4o"), Some(Provider::Codex));
        assert_eq!(classify(MODEL_ID_RULES, "o3-mini"), Some(Provider::Codex));
        assert_eq!(classify(MODEL_ID_RULES, "gpt-5-codex"), Some(Provider::Codex));
        assert_eq!(classify(MODEL_ID_RULES, "deepseek-r1"), None);
    }

    #[test]
    fn canonical_order_and_ids_round_trip() {
        for (index, provider) in Provider::ALL.iter().enumerate() {
            assert_eq!(provider.rank(), index);
            assert_eq!(Provider::from_id(provider.id()), Some(*provider));
        }
    }

    #[test]
    fn serde_uses_ids() {
        let json = serde_json::to_string(&Provider::OpenAiCompat).unwrap();
        assert_eq!(json, "\"openai-compat\"");
    }

    #[test]
    fn fallback_ids() {
        assert!(Provider::Unknown.is_fallback());
        assert!(Provider::ProxyAccess.is_fallback());
        assert!(Provider::OpenAiCompat.is_fallback());
        assert!(!Provider::Claude.is_fallback());
    }
}
