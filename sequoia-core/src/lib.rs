//! Sequoia Core — symbols, price series, data acquisition, universe, signals.
//!
//! This crate holds everything a scan needs below the orchestration layer:
//! - Domain types (ticker symbol, price bar, canonical price series)
//! - Resilient HTTP client with retry, backoff and default timeout
//! - Source adapters (Eastmoney, Tushare, Sina) and the data waterfall
//! - Per-source circuit breakers
//! - Universe resolver with listing channels, cache file and fallback
//! - Signal trait, indicators and the fixed signal registry

pub mod clock;
pub mod data;
pub mod domain;
pub mod persist;
pub mod signal;
pub mod universe;
