//! Credential freshness evaluation for on-disk OAuth token files.
//!
//! The proxy keeps one JSON file per authenticated account in its auth
//! directory. Files come from different login flows and disagree on field
//! names and timestamp encodings, so each file is read as a generic JSON
//! object and probed for the handful of fields that matter: a provider hint,
//! an account label, an expiry and a last-refresh time.
//!
//! Every file gets a [`FreshnessLevel`]; levels roll up per provider by
//! taking the most severe one. Static API keys from the proxy's YAML config
//! count toward a provider's auth mode without having a freshness of their
//! own.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::provider::{Provider, normalize_hint};
use crate::storage::config::Settings;
use crate::util::time::{format_span, parse_timestamp};

/// Expiry inside this window is a warning.
const EXPIRING_SOON_HOURS: i64 = 24;
/// Refresh within this many days counts as fresh.
const REFRESH_FRESH_DAYS: i64 = 7;
/// Refresh within this many days is a warning; older is stale.
const REFRESH_WARNING_DAYS: i64 = 30;
/// Files touched within this many days without metadata are `unknown`.
const MODIFIED_RECENT_DAYS: i64 = 30;

const ACCOUNT_KEYS: &[&str] = &["email", "account", "account_id", "username", "label"];
const EXPIRY_KEYS: &[&str] = &[
    "expired",
    "expires_at",
    "expiresAt",
    "expiry",
    "expire",
    "expiry_date",
    "expires",
];
const REFRESH_KEYS: &[&str] = &[
    "last_refresh",
    "lastRefresh",
    "last_refreshed_at",
    "refreshed_at",
    "updated_at",
];

/// YAML config keys holding static API key lists.
pub const STATIC_KEY_FIELDS: &[(&str, Provider)] = &[
    ("api-keys", Provider::ProxyAccess),
    ("claude-api-key", Provider::Claude),
    ("codex-api-key", Provider::Codex),
    ("gemini-api-key", Provider::Gemini),
    ("generative-language-api-key", Provider::Gemini),
    ("openai-compatibility", Provider::OpenAiCompat),
];

// =============================================================================
// Freshness Levels
// =============================================================================

/// Severity of a credential's remaining validity, least severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FreshnessLevel {
    /// No credentials of any kind.
    Missing,
    /// Only static API keys.
    Configured,
    Fresh,
    /// No expiry metadata, but the file was touched recently.
    Unknown,
    Warning,
    Stale,
    Expired,
    /// Unreadable or malformed file.
    Error,
}

impl FreshnessLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Configured => "configured",
            Self::Fresh => "fresh",
            Self::Unknown => "unknown",
            Self::Warning => "warning",
            Self::Stale => "stale",
            Self::Expired => "expired",
            Self::Error => "error",
        }
    }
}

/// A level together with the reason for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Freshness {
    pub level: FreshnessLevel,
    pub message: String,
}

impl Freshness {
    fn new(level: FreshnessLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

// =============================================================================
// Credential Files
// =============================================================================

/// One credential file and its evaluated freshness.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialFile {
    pub file_name: String,
    pub provider: Provider,
    pub account_label: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub size_bytes: u64,
    pub parse_error: Option<String>,
    pub status: FreshnessLevel,
    pub status_message: String,
}

impl CredentialFile {
    /// Build a credential record from file contents.
    ///
    /// `contents` is the read result; a read error is recorded like a parse
    /// error.
    #[must_use]
    pub fn from_contents(
        file_name: &str,
        contents: Result<&str, String>,
        modified_at: Option<DateTime<Utc>>,
        size_bytes: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let mut file = Self {
            file_name: file_name.to_string(),
            provider: normalize_hint(file_name),
            account_label: None,
            expires_at: None,
            last_refresh_at: None,
            modified_at,
            size_bytes,
            parse_error: None,
            status: FreshnessLevel::Unknown,
            status_message: String::new(),
        };

        match contents.and_then(parse_object) {
            Ok(object) => file.apply_fields(&object),
            Err(error) => file.parse_error = Some(error),
        }

        let freshness = file.freshness(now);
        file.status = freshness.level;
        file.status_message = freshness.message;
        file
    }

    fn apply_fields(&mut self, object: &Map<String, Value>) {
        if let Some(hint) = first_string(object, &["type", "provider"]) {
            self.provider = normalize_hint(&hint);
        }
        self.account_label = first_string(object, ACCOUNT_KEYS);
        self.expires_at = first_timestamp(object, EXPIRY_KEYS);
        self.last_refresh_at = first_timestamp(object, REFRESH_KEYS);
    }

    /// Classify this file against `now`, highest-fidelity signal first.
    #[must_use]
    pub fn freshness(&self, now: DateTime<Utc>) -> Freshness {
        if let Some(error) = &self.parse_error {
            return Freshness::new(FreshnessLevel::Error, format!("parse error: {error}"));
        }

        if let Some(expires_at) = self.expires_at {
            let remaining = expires_at.signed_duration_since(now);
            return if expires_at <= now {
                Freshness::new(
                    FreshnessLevel::Expired,
                    format!("expired {} ago", format_span(remaining)),
                )
            } else if remaining <= Duration::hours(EXPIRING_SOON_HOURS) {
                Freshness::new(
                    FreshnessLevel::Warning,
                    format!("expires in {}", format_span(remaining)),
                )
            } else {
                Freshness::new(
                    FreshnessLevel::Fresh,
                    format!("expires in {}", format_span(remaining)),
                )
            };
        }

        if let Some(refreshed) = self.last_refresh_at {
            let age = now.signed_duration_since(refreshed);
            let span = format_span(age);
            return if age <= Duration::days(REFRESH_FRESH_DAYS) {
                Freshness::new(FreshnessLevel::Fresh, format!("refreshed {span} ago"))
            } else if age <= Duration::days(REFRESH_WARNING_DAYS) {
                Freshness::new(FreshnessLevel::Warning, format!("last refreshed {span} ago"))
            } else {
                Freshness::new(FreshnessLevel::Stale, format!("not refreshed for {span}"))
            };
        }

        if let Some(modified) = self.modified_at {
            let age = now.signed_duration_since(modified);
            let span = format_span(age);
            return if age <= Duration::days(MODIFIED_RECENT_DAYS) {
                Freshness::new(
                    FreshnessLevel::Unknown,
                    format!("no expiry metadata; modified {span} ago"),
                )
            } else {
                Freshness::new(
                    FreshnessLevel::Stale,
                    format!("no expiry metadata; unchanged for {span}"),
                )
            };
        }

        Freshness::new(FreshnessLevel::Unknown, "no expiry metadata")
    }

    /// Expired by its own expiry timestamp, regardless of level.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Expiring within 24 hours by its own expiry timestamp.
    #[must_use]
    pub fn is_expiring_soon(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| at > now && at <= now + Duration::hours(EXPIRING_SOON_HOURS))
    }
}

fn parse_object(contents: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(contents) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err("expected a JSON object".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn first_string(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// First parseable timestamp among `keys`, then the same keys inside a
/// nested `token` object.
fn first_timestamp(object: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    let top = keys
        .iter()
        .filter_map(|key| object.get(*key))
        .find_map(parse_timestamp);
    top.or_else(|| {
        object
            .get("token")
            .and_then(Value::as_object)
            .and_then(|nested| {
                keys.iter()
                    .filter_map(|key| nested.get(*key))
                    .find_map(parse_timestamp)
            })
    })
}

// =============================================================================
// Provider Rollup
// =============================================================================

/// How a provider authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthMode {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "oauth")]
    OAuth,
    #[serde(rename = "api-keys")]
    ApiKeys,
    #[serde(rename = "mixed")]
    Mixed,
}

impl AuthMode {
    const fn from_counts(oauth: usize, static_keys: usize) -> Self {
        match (oauth > 0, static_keys > 0) {
            (true, true) => Self::Mixed,
            (true, false) => Self::OAuth,
            (false, true) => Self::ApiKeys,
            (false, false) => Self::None,
        }
    }
}

/// Authentication health for one provider across all sources.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub provider: Provider,
    pub status: FreshnessLevel,
    pub status_message: String,
    pub auth_mode: AuthMode,
    pub oauth_count: usize,
    pub static_key_count: usize,
    pub expired_count: usize,
    pub expiring_soon_count: usize,
    pub parse_error_count: usize,
    pub soonest_expiry: Option<DateTime<Utc>>,
    pub latest_refresh: Option<DateTime<Utc>>,
}

/// Roll credential files and static key counts up into per-provider health.
///
/// `files` must already be sorted by file name; the first file reaching the
/// worst level supplies the provider's message.
#[must_use]
pub fn rollup(
    files: &[CredentialFile],
    static_keys: &BTreeMap<Provider, usize>,
    now: DateTime<Utc>,
) -> Vec<ProviderHealth> {
    let mut providers: Vec<Provider> = Provider::ALL
        .iter()
        .copied()
        .filter(|p| *p != Provider::Unknown)
        .collect();
    if files.iter().any(|f| f.provider == Provider::Unknown) {
        providers.push(Provider::Unknown);
    }

    providers
        .into_iter()
        .map(|provider| {
            let mine: Vec<&CredentialFile> =
                files.iter().filter(|f| f.provider == provider).collect();
            let static_key_count = static_keys.get(&provider).copied().unwrap_or(0);
            provider_health(provider, &mine, static_key_count, now)
        })
        .collect()
}

fn provider_health(
    provider: Provider,
    files: &[&CredentialFile],
    static_key_count: usize,
    now: DateTime<Utc>,
) -> ProviderHealth {
    let (status, status_message) = worst_file(files).map_or_else(
        || {
            if static_key_count > 0 {
                (
                    FreshnessLevel::Configured,
                    format!("{static_key_count} static key(s) configured"),
                )
            } else {
                (FreshnessLevel::Missing, "no credentials found".to_string())
            }
        },
        |file| {
            (
                file.status,
                format!("{}: {}", file.file_name, file.status_message),
            )
        },
    );

    ProviderHealth {
        provider,
        status,
        status_message,
        auth_mode: AuthMode::from_counts(files.len(), static_key_count),
        oauth_count: files.len(),
        static_key_count,
        expired_count: files.iter().filter(|f| f.is_expired(now)).count(),
        expiring_soon_count: files.iter().filter(|f| f.is_expiring_soon(now)).count(),
        parse_error_count: files.iter().filter(|f| f.parse_error.is_some()).count(),
        soonest_expiry: files.iter().filter_map(|f| f.expires_at).min(),
        latest_refresh: files.iter().filter_map(|f| f.last_refresh_at).max(),
    }
}

/// First file (in the given order) with the maximum level.
fn worst_file<'a>(files: &[&'a CredentialFile]) -> Option<&'a CredentialFile> {
    let mut worst: Option<&CredentialFile> = None;
    for file in files {
        if worst.is_none_or(|current| file.status > current.status) {
            worst = Some(file);
        }
    }
    worst
}

// =============================================================================
// Static Keys
// =============================================================================

/// Count list entries under the known static-key fields.
#[must_use]
pub fn count_static_keys(document: &serde_yaml::Value) -> BTreeMap<Provider, usize> {
    let mut counts = BTreeMap::new();
    for (field, provider) in STATIC_KEY_FIELDS {
        let entries = document
            .get(*field)
            .and_then(serde_yaml::Value::as_sequence)
            .map_or(0, Vec::len);
        if entries > 0 {
            *counts.entry(*provider).or_insert(0) += entries;
        }
    }
    counts
}

/// Load static key counts from the proxy's YAML config.
///
/// A missing file yields empty counts and no error; an unreadable or
/// malformed file yields empty counts and the error text.
pub async fn load_static_keys(path: &Path) -> (BTreeMap<Provider, usize>, Option<String>) {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => match serde_yaml::from_str::<serde_yaml::Value>(&content) {
            Ok(document) => (count_static_keys(&document), None),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "proxy config is not valid YAML"
                );
                (BTreeMap::new(), Some(e.to_string()))
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => (BTreeMap::new(), None),
        Err(e) => (BTreeMap::new(), Some(e.to_string())),
    }
}

// =============================================================================
// Directory Scan
// =============================================================================

/// Read every `*.json` file in `dir`, sorted by file name.
///
/// # Errors
///
/// Returns the directory error text if the directory cannot be listed.
pub async fn scan_directory(
    dir: &Path,
    now: DateTime<Utc>,
) -> Result<Vec<CredentialFile>, String> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| format!("{}: {e}", dir.display()))?;

    let mut paths: Vec<PathBuf> = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                if is_credential_file(&path) {
                    paths.push(path);
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(
                    dir = %dir.display(),
                    error = %e,
                    "directory listing stopped early"
                );
                break;
            }
        }
    }

    let mut files: Vec<CredentialFile> =
        futures::future::join_all(paths.iter().map(|path| read_credential(path, now)))
            .await
            .into_iter()
            .flatten()
            .collect();
    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(files)
}

fn is_credential_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Directories are skipped; any other file that cannot be inspected is
/// still reported, with the failure as its parse error.
async fn read_credential(path: &Path, now: DateTime<Utc>) -> Option<CredentialFile> {
    let file_name = path.file_name()?.to_string_lossy().into_owned();
    let file = match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => return None,
        Ok(metadata) if !metadata.is_file() => CredentialFile::from_contents(
            &file_name,
            Err("not a regular file".to_string()),
            None,
            0,
            now,
        ),
        Ok(metadata) => {
            let modified_at = metadata.modified().ok().map(system_time_to_utc);
            let contents = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| format!("cannot read file: {e}"));
            CredentialFile::from_contents(
                &file_name,
                contents.as_deref().map_err(Clone::clone),
                modified_at,
                metadata.len(),
                now,
            )
        }
        Err(e) => CredentialFile::from_contents(
            &file_name,
            Err(format!("cannot read file: {e}")),
            None,
            0,
            now,
        ),
    };
    tracing::debug!(
        file = %file.file_name,
        provider = %file.provider,
        status = file.status.as_str(),
        "evaluated credential file"
    );
    Some(file)
}

fn system_time_to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

// =============================================================================
// Auth Report
// =============================================================================

/// Credential and auth-mechanism report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthReport {
    pub auth_dir: String,
    pub dir_error: Option<String>,
    pub config_path: String,
    pub config_error: Option<String>,
    pub files: Vec<CredentialFile>,
    pub providers: Vec<ProviderHealth>,
    pub generated_at: DateTime<Utc>,
}

impl AuthReport {
    /// Provider entry by id.
    #[must_use]
    pub fn provider(&self, provider: Provider) -> Option<&ProviderHealth> {
        self.providers.iter().find(|p| p.provider == provider)
    }
}

/// Evaluate the configured auth directory and proxy config at `now`.
pub async fn evaluate(settings: &Settings, now: DateTime<Utc>) -> AuthReport {
    let (scan, (static_keys, config_error)) = tokio::join!(
        scan_directory(&settings.auth_dir, now),
        load_static_keys(&settings.proxy_config_path),
    );

    let (files, dir_error) = match scan {
        Ok(files) => (files, None),
        Err(error) => {
            tracing::warn!(error = %error, "cannot scan auth directory");
            (Vec::new(), Some(error))
        }
    };

    let providers = rollup(&files, &static_keys, now);
    AuthReport {
        auth_dir: settings.auth_dir.display().to_string(),
        dir_error,
        config_path: settings.proxy_config_path.display().to_string(),
        config_error,
        files,
        providers,
        generated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn file_with(json: &str) -> CredentialFile {
        CredentialFile::from_contents("test.json", Ok(json), None, json.len() as u64, now())
    }

    fn expiring_in(hours: i64) -> CredentialFile {
        let at = (now() + Duration::hours(hours)).to_rfc3339();
        file_with(&format!(r#"{{"type":"claude","expired":"{at}"}}"#))
    }

    // =========================================================================
    // Classification
    // =========================================================================

    #[test]
    fn expiry_beyond_a_day_is_fresh() {
        assert_eq!(expiring_in(25).status, FreshnessLevel::Fresh);
        assert_eq!(expiring_in(24 * 30).status, FreshnessLevel::Fresh);
    }

    #[test]
    fn expiry_within_a_day_is_warning() {
        assert_eq!(expiring_in(1).status, FreshnessLevel::Warning);
        assert_eq!(expiring_in(24).status, FreshnessLevel::Warning);
    }

    #[test]
    fn expiry_at_or_before_now_is_expired() {
        assert_eq!(expiring_in(0).status, FreshnessLevel::Expired);
        assert_eq!(expiring_in(-3).status, FreshnessLevel::Expired);
        assert!(expiring_in(-3).status_message.starts_with("expired 3h ago"));
    }

    #[test]
    fn parse_error_forces_error_level() {
        let file = file_with("{not json");
        assert_eq!(file.status, FreshnessLevel::Error);
        assert!(file.parse_error.is_some());
        assert!(file.expires_at.is_none());
    }

    #[test]
    fn non_object_json_is_parse_error() {
        let file = file_with("[1,2,3]");
        assert_eq!(file.status, FreshnessLevel::Error);
    }

    #[test]
    fn refresh_age_thresholds() {
        let at = |days: i64| (now() - Duration::days(days)).to_rfc3339();
        let level = |days| file_with(&format!(r#"{{"last_refresh":"{}"}}"#, at(days))).status;
        assert_eq!(level(2), FreshnessLevel::Fresh);
        assert_eq!(level(7), FreshnessLevel::Fresh);
        assert_eq!(level(8), FreshnessLevel::Warning);
        assert_eq!(level(30), FreshnessLevel::Warning);
        assert_eq!(level(31), FreshnessLevel::Stale);
    }

    #[test]
    fn expiry_beats_refresh() {
        let expired = (now() - Duration::hours(1)).to_rfc3339();
        let refreshed = (now() - Duration::hours(1)).to_rfc3339();
        let file = file_with(&format!(
            r#"{{"expired":"{expired}","last_refresh":"{refreshed}"}}"#
        ));
        assert_eq!(file.status, FreshnessLevel::Expired);
    }

    #[test]
    fn modification_time_fallback() {
        let recent = CredentialFile::from_contents(
            "x.json",
            Ok("{}"),
            Some(now() - Duration::days(3)),
            2,
            now(),
        );
        assert_eq!(recent.status, FreshnessLevel::Unknown);

        let old = CredentialFile::from_contents(
            "x.json",
            Ok("{}"),
            Some(now() - Duration::days(45)),
            2,
            now(),
        );
        assert_eq!(old.status, FreshnessLevel::Stale);

        assert_eq!(file_with("{}").status, FreshnessLevel::Unknown);
    }

    #[test]
    fn unparseable_expiry_falls_through() {
        let file = file_with(r#"{"expired":"someday"}"#);
        assert!(file.expires_at.is_none());
        assert_eq!(file.status, FreshnessLevel::Unknown);
    }

    #[test]
    fn epoch_millis_and_nested_token_expiry() {
        let millis = (now() + Duration::hours(5)).timestamp_millis();
        let file = file_with(&format!(r#"{{"type":"gemini","token":{{"expiry_date":{millis}}}}}"#));
        assert_eq!(file.provider, Provider::Gemini);
        assert_eq!(file.status, FreshnessLevel::Warning);
    }

    #[test]
    fn extracts_provider_and_account() {
        let file = file_with(r#"{"type":"codex","email":"dev@example.com"}"#);
        assert_eq!(file.provider, Provider::Codex);
        assert_eq!(file.account_label.as_deref(), Some("dev@example.com"));
    }

    #[test]
    fn provider_falls_back_to_file_name() {
        let file = CredentialFile::from_contents("qwen-abc.json", Ok("{}"), None, 2, now());
        assert_eq!(file.provider, Provider::Qwen);
    }

    #[test]
    fn read_errors_are_recorded_as_parse_errors() {
        let file = CredentialFile::from_contents(
            "locked.json",
            Err("cannot read file: permission denied".to_string()),
            None,
            0,
            now(),
        );
        assert_eq!(file.status, FreshnessLevel::Error);
        assert_eq!(file.provider, Provider::Unknown);
    }

    #[test]
    fn severity_ordering_matches_rollup_contract() {
        use FreshnessLevel::*;
        let ordered = [Missing, Configured, Fresh, Unknown, Warning, Stale, Expired, Error];
        for pair in ordered.windows(2) {
            assert!(pair[0] < pair[1], "{:?} < {:?}", pair[0], pair[1]);
        }
    }

    // =========================================================================
    // Rollup
    // =========================================================================

    fn named(name: &str, json: &str) -> CredentialFile {
        CredentialFile::from_contents(name, Ok(json), None, 1, now())
    }

    #[test]
    fn rollup_takes_worst_level_and_first_message() {
        let soon = (now() + Duration::hours(2)).to_rfc3339();
        let later = (now() + Duration::days(20)).to_rfc3339();
        let files = vec![
            named("a.json", &format!(r#"{{"type":"claude","expired":"{later}"}}"#)),
            named("b.json", &format!(r#"{{"type":"claude","expired":"{soon}"}}"#)),
            named("c.json", &format!(r#"{{"type":"claude","expired":"{soon}"}}"#)),
        ];
        let providers = rollup(&files, &BTreeMap::new(), now());
        let claude = providers.iter().find(|p| p.provider == Provider::Claude).unwrap();
        assert_eq!(claude.status, FreshnessLevel::Warning);
        assert!(claude.status_message.starts_with("b.json"));
        assert_eq!(claude.oauth_count, 3);
        assert_eq!(claude.expiring_soon_count, 2);
        assert_eq!(claude.auth_mode, AuthMode::OAuth);
    }

    #[test]
    fn counts_are_independent_of_rollup_level() {
        let soon = (now() + Duration::hours(2)).to_rfc3339();
        let files = vec![
            named("a.json", "{broken"),
            named("b.json", &format!(r#"{{"type":"unknown-thing","expired":"{soon}"}}"#)),
        ];
        let providers = rollup(&files, &BTreeMap::new(), now());
        let unknown = providers.iter().find(|p| p.provider == Provider::Unknown).unwrap();
        assert_eq!(unknown.status, FreshnessLevel::Error);
        assert_eq!(unknown.expiring_soon_count, 1);
        assert_eq!(unknown.parse_error_count, 1);
    }

    #[test]
    fn static_only_is_configured_and_absent_is_missing() {
        let mut keys = BTreeMap::new();
        keys.insert(Provider::Gemini, 2);
        let providers = rollup(&[], &keys, now());

        let gemini = providers.iter().find(|p| p.provider == Provider::Gemini).unwrap();
        assert_eq!(gemini.status, FreshnessLevel::Configured);
        assert_eq!(gemini.auth_mode, AuthMode::ApiKeys);
        assert_eq!(gemini.static_key_count, 2);

        let qwen = providers.iter().find(|p| p.provider == Provider::Qwen).unwrap();
        assert_eq!(qwen.status, FreshnessLevel::Missing);
        assert_eq!(qwen.auth_mode, AuthMode::None);

        assert!(providers.iter().all(|p| p.provider != Provider::Unknown));
    }

    #[test]
    fn mixed_mode_when_both_sources_exist() {
        let later = (now() + Duration::days(20)).to_rfc3339();
        let files = vec![named("a.json", &format!(r#"{{"type":"codex","expired":"{later}"}}"#))];
        let mut keys = BTreeMap::new();
        keys.insert(Provider::Codex, 1);
        let providers = rollup(&files, &keys, now());
        let codex = providers.iter().find(|p| p.provider == Provider::Codex).unwrap();
        assert_eq!(codex.auth_mode, AuthMode::Mixed);
        assert_eq!(codex.status, FreshnessLevel::Fresh);
    }

    // =========================================================================
    // Static keys
    // =========================================================================

    #[test]
    fn counts_static_key_lists() {
        let document: serde_yaml::Value = serde_yaml::from_str(
            r"
port: 8317
api-keys:
  - local-1
  - local-2
gemini-api-key:
  - api-key: a
generative-language-api-key:
  - b
claude-api-key: []
openai-compatibility:
  - name: openrouter
    base-url: https://openrouter.ai/api/v1
",
        )
        .unwrap();
        let counts = count_static_keys(&document);
        assert_eq!(counts.get(&Provider::ProxyAccess), Some(&2));
        assert_eq!(counts.get(&Provider::Gemini), Some(&2));
        assert_eq!(counts.get(&Provider::OpenAiCompat), Some(&1));
        assert_eq!(counts.get(&Provider::Claude), None);
    }

    #[tokio::test]
    async fn missing_proxy_config_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (counts, error) = load_static_keys(&dir.path().join("config.yaml")).await;
        assert!(counts.is_empty());
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn malformed_proxy_config_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "api-keys: [unclosed").unwrap();
        let (counts, error) = load_static_keys(&path).await;
        assert!(counts.is_empty());
        assert!(error.is_some());
    }

    // =========================================================================
    // Directory scan
    // =========================================================================

    #[tokio::test]
    async fn scan_sorts_by_name_and_skips_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("zeta.json"), r#"{"type":"codex"}"#).unwrap();
        std::fs::write(dir.path().join("alpha.JSON"), r#"{"type":"claude"}"#).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();

        let files = scan_directory(dir.path(), Utc::now()).await.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, ["alpha.JSON", "zeta.json"]);
        assert!(files.iter().all(|f| f.modified_at.is_some()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_entry_is_reported_with_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("claude.json"), r#"{"type":"claude"}"#).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("dangling.json"))
            .unwrap();

        let files = scan_directory(dir.path(), now()).await.unwrap();
        assert_eq!(files.len(), 2);
        let dangling = &files[1];
        assert_eq!(dangling.file_name, "dangling.json");
        assert!(
            dangling
                .parse_error
                .as_deref()
                .is_some_and(|e| e.starts_with("cannot read file"))
        );
        assert_eq!(dangling.status, FreshnessLevel::Error);
        assert!(dangling.modified_at.is_none());
    }

    #[tokio::test]
    async fn scan_of_missing_directory_is_error_text() {
        let dir = tempfile::tempdir().unwrap();
        let result = scan_directory(&dir.path().join("absent"), Utc::now()).await;
        assert!(result.is_err());
    }
}
