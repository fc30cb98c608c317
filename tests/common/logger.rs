//! Phase-tagged logging for integration tests.
#![allow(dead_code)]
//!
//! Output goes to stderr, which the test harness captures unless
//! `--nocapture` is given. `TEST_LOG_JSON=1` switches to one JSON object
//! per line.

use std::cell::RefCell;
use std::time::Instant;

use serde_json::json;

/// Per-test logger tracking the current phase and elapsed time.
pub struct TestLogger {
    name: String,
    started: Instant,
    phase: RefCell<String>,
    json: bool,
}

impl TestLogger {
    #[must_use]
    pub fn new(name: &str) -> Self {
        let json = std::env::var("TEST_LOG_JSON").is_ok_and(|v| v == "1" || v == "true");
        let logger = Self {
            name: name.to_string(),
            started: Instant::now(),
            phase: RefCell::new("start".to_string()),
            json,
        };
        logger.emit("INFO", "test started");
        logger
    }

    fn emit(&self, level: &str, message: &str) {
        let elapsed_ms = self.started.elapsed().as_millis();
        let phase = self.phase.borrow();
        if self.json {
            eprintln!(
                "{}",
                json!({
                    "test": self.name,
                    "level": level,
                    "phase": *phase,
                    "elapsedMs": elapsed_ms,
                    "message": message,
                })
            );
        } else {
            eprintln!("[{level:<5}] {} [{phase}] +{elapsed_ms}ms {message}", self.name);
        }
    }

    /// Enter a named phase (setup, execute, verify).
    pub fn phase(&self, phase: &str) {
        *self.phase.borrow_mut() = phase.to_string();
        self.emit("INFO", &format!("phase: {phase}"));
    }

    pub fn info(&self, message: &str) {
        self.emit("INFO", message);
    }

    pub fn debug(&self, message: &str) {
        self.emit("DEBUG", message);
    }

    /// Record an outgoing HTTP request.
    pub fn http_request(&self, method: &str, url: &str) {
        self.emit("DEBUG", &format!("{method} {url}"));
    }

    pub fn finish_ok(&self) {
        self.emit("INFO", "test passed");
    }
}
