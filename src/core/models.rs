//! Upstream model catalog aggregation.
//!
//! The proxy exposes its model list in two shapes: an OpenAI-style
//! `GET /v1/models` (`data[]` of `{id, owned_by, display_name}`) and a
//! Gemini-style `GET /v1beta/models` (`models[]` of `{name, owned_by,
//! displayName}`). Both are fetched concurrently, normalized to
//! `(provider, id)` pairs and merged into one provider-grouped catalog.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::core::http::{JsonResponse, build_client, get_json};
use crate::core::provider::{MODEL_ID_RULES, Provider, classify, normalize_hint};
use crate::storage::config::Settings;

// =============================================================================
// Data Types
// =============================================================================

/// Listing endpoint a model was seen on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceApi {
    /// `GET /v1/models`
    OpenAi,
    /// `GET /v1beta/models`
    Gemini,
}

impl SourceApi {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }

    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::OpenAi => "/v1/models",
            Self::Gemini => "/v1beta/models",
        }
    }
}

/// One model, keyed by `(provider, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelEntry {
    pub provider: String,
    pub id: String,
    pub display_name: Option<String>,
    pub owner_label: Option<String>,
    pub source_apis: BTreeSet<SourceApi>,
}

/// Models belonging to one provider, sorted by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderGroup {
    pub provider: String,
    pub models: Vec<ModelEntry>,
}

/// Outcome of one listing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    pub ok: bool,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub model_count: usize,
    pub timed_out: bool,
}

/// Per-endpoint outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogSources {
    pub openai: SourceStatus,
    pub gemini: SourceStatus,
}

/// Provider-grouped model catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCatalog {
    pub providers: Vec<ProviderGroup>,
    pub sources: CatalogSources,
    pub total_models: usize,
    pub generated_at: DateTime<Utc>,
}

impl ModelCatalog {
    /// Look up a model by provider and id.
    #[must_use]
    pub fn find(&self, provider: &str, id: &str) -> Option<&ModelEntry> {
        self.providers
            .iter()
            .filter(|group| group.provider == provider)
            .flat_map(|group| group.models.iter())
            .find(|model| model.id == id)
    }
}

/// A listing record before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawModel {
    pub id: String,
    pub owner: Option<String>,
    pub display_name: Option<String>,
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse an OpenAI-style listing body.
#[must_use]
pub fn parse_openai_listing(body: &Value) -> Vec<RawModel> {
    records(body, "data", "id")
}

/// Parse a Gemini-style listing body. Ids lose their `models/` prefix.
#[must_use]
pub fn parse_gemini_listing(body: &Value) -> Vec<RawModel> {
    records(body, "models", "name")
}

fn records(body: &Value, list_key: &str, id_key: &str) -> Vec<RawModel> {
    body.get(list_key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let raw_id = string_field(item, &[id_key, "id"])?;
                    let id = raw_id.strip_prefix("models/").unwrap_or(&raw_id).to_string();
                    if id.is_empty() {
                        return None;
                    }
                    Some(RawModel {
                        id,
                        owner: string_field(item, &["owned_by", "ownedBy"]),
                        display_name: string_field(item, &["display_name", "displayName"]),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn string_field(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| item.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(ToString::to_string)
}

// =============================================================================
// Normalization & Merge
// =============================================================================

/// Provider id for a model record.
///
/// A recognizable owner wins unless it only names the proxy itself; then the
/// model id decides; then the raw owner; then `unknown`.
#[must_use]
pub fn infer_provider(id: &str, owner: Option<&str>) -> String {
    let owner = owner.map(str::trim).filter(|o| !o.is_empty());
    if let Some(owner) = owner {
        let normalized = normalize_hint(owner);
        if !normalized.is_fallback() {
            return normalized.id().to_string();
        }
    }
    if let Some(provider) = classify(MODEL_ID_RULES, id) {
        return provider.id().to_string();
    }
    owner.map_or_else(|| Provider::Unknown.id().to_string(), str::to_lowercase)
}

/// Merge both listings into sorted provider groups.
///
/// OpenAI-style records are always applied first, so the result does not
/// depend on which response arrived first.
#[must_use]
pub fn merge(openai: &[RawModel], gemini: &[RawModel]) -> Vec<ProviderGroup> {
    let mut merged: BTreeMap<(String, String), ModelEntry> = BTreeMap::new();

    let tagged = openai
        .iter()
        .map(|m| (m, SourceApi::OpenAi))
        .chain(gemini.iter().map(|m| (m, SourceApi::Gemini)));

    for (raw, source) in tagged {
        let provider = infer_provider(&raw.id, raw.owner.as_deref());
        let entry = merged
            .entry((provider.clone(), raw.id.clone()))
            .or_insert_with(|| ModelEntry {
                provider,
                id: raw.id.clone(),
                display_name: None,
                owner_label: None,
                source_apis: BTreeSet::new(),
            });
        entry.source_apis.insert(source);
        if entry.display_name.is_none() {
            entry.display_name.clone_from(&raw.display_name);
        }
        if entry.owner_label.is_none() {
            entry.owner_label.clone_from(&raw.owner);
        }
    }

    let mut groups: BTreeMap<String, Vec<ModelEntry>> = BTreeMap::new();
    for ((provider, _), entry) in merged {
        groups.entry(provider).or_default().push(entry);
    }

    let mut groups: Vec<ProviderGroup> = groups
        .into_iter()
        .map(|(provider, models)| ProviderGroup { provider, models })
        .collect();
    groups.sort_by(|a, b| group_order(&a.provider).cmp(&group_order(&b.provider)));
    groups
}

/// Canonical providers first in fixed order, others alphabetically.
fn group_order(provider: &str) -> (usize, &str) {
    (
        Provider::from_id(provider).map_or(Provider::ALL.len(), Provider::rank),
        provider,
    )
}

// =============================================================================
// Fetch
// =============================================================================

fn source_status(response: &JsonResponse, model_count: usize) -> SourceStatus {
    SourceStatus {
        ok: response.ok(),
        status: response.status,
        error: response.error.clone(),
        model_count,
        timed_out: response.timed_out,
    }
}

fn failed_sources(error: &str) -> CatalogSources {
    let status = SourceStatus {
        error: Some(error.to_string()),
        ..SourceStatus::default()
    };
    CatalogSources {
        openai: status.clone(),
        gemini: status,
    }
}

/// Fetch both listings and build the catalog.
pub async fn fetch_catalog(settings: &Settings) -> ModelCatalog {
    let client = match build_client(settings.models_timeout) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "cannot build HTTP client for model listing");
            return ModelCatalog {
                providers: Vec::new(),
                sources: failed_sources(&e.to_string()),
                total_models: 0,
                generated_at: Utc::now(),
            };
        }
    };

    let base = settings.api_base_url.trim_end_matches('/');
    let api_key = settings.api_key.as_deref();
    let openai_url = format!("{base}{}", SourceApi::OpenAi.path());
    let gemini_url = format!("{base}{}", SourceApi::Gemini.path());

    let (openai, gemini) = tokio::join!(
        get_json(&client, &openai_url, api_key),
        get_json(&client, &gemini_url, api_key),
    );

    let openai_models = openai.body.as_ref().map(parse_openai_listing).unwrap_or_default();
    let gemini_models = gemini.body.as_ref().map(parse_gemini_listing).unwrap_or_default();

    let providers = merge(&openai_models, &gemini_models);
    let total_models = providers.iter().map(|g| g.models.len()).sum();
    tracing::debug!(
        openai = openai_models.len(),
        gemini = gemini_models.len(),
        total = total_models,
        "model catalog merged"
    );

    ModelCatalog {
        providers,
        sources: CatalogSources {
            openai: source_status(&openai, openai_models.len()),
            gemini: source_status(&gemini, gemini_models.len()),
        },
        total_models,
        generated_at: Utc::now(),
    }
}
