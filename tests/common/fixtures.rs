//! Fixture layouts for integration tests.
#![allow(dead_code)]

use serde_json::{Value, json};

use proxydash::storage::config::Settings;
use proxydash::test_utils::{TestDir, settings_in};

/// A throwaway proxy deployment: project dir, auth dir and proxy config.
pub struct ProxyLayout {
    pub dir: TestDir,
}

impl ProxyLayout {
    #[must_use]
    pub fn new() -> Self {
        let dir = TestDir::new();
        dir.create_dir("auths");
        Self { dir }
    }

    /// Write a credential file into the auth directory.
    pub fn credential(&self, name: &str, body: &str) -> &Self {
        self.dir.create_file(&format!("auths/{name}"), body);
        self
    }

    /// Write the proxy's YAML config.
    pub fn proxy_config(&self, yaml: &str) -> &Self {
        self.dir.create_file("config.yaml", yaml);
        self
    }

    #[must_use]
    pub fn settings(&self) -> Settings {
        settings_in(self.dir.path())
    }
}

/// OpenAI-style `/v1/models` body.
#[must_use]
pub fn openai_listing(models: &[(&str, &str)]) -> Value {
    let data: Vec<Value> = models
        .iter()
        .map(|(id, owner)| json!({"id": id, "object": "model", "owned_by": owner}))
        .collect();
    json!({"object": "list", "data": data})
}

/// Gemini-style `/v1beta/models` body.
#[must_use]
pub fn gemini_listing(models: &[(&str, &str)]) -> Value {
    let models: Vec<Value> = models
        .iter()
        .map(|(name, display)| json!({"name": name, "displayName": display}))
        .collect();
    json!({"models": models})
}
