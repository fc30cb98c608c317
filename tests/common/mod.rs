//! Common test utilities and fixtures for integration tests.
//!
//! # Modules
//!
//! - `fixtures`: On-disk proxy layouts and listing payloads
//! - `logger`: Phase-tagged test logging

pub mod fixtures;
pub mod logger;
