//! Sequoia Runner — scan orchestration on top of `sequoia-core`.
//!
//! This crate provides:
//! - TOML run configuration with defaults for every field
//! - The scan loop, sequential or on a bounded worker pool
//! - Market-breadth run statistics
//! - Result sink (selected-symbol file) and JSON/CSV artifacts
//! - Push notification formatting and delivery

pub mod config;
pub mod export;
pub mod notify;
pub mod scan;
pub mod sink;
pub mod stats;

pub use config::{ConfigError, SequoiaConfig};
pub use notify::{select_notifier, stats_message, strategy_message, Notifier};
pub use scan::{run_scan, ScanError, ScanOptions, ScanResult, SignalHit, SymbolOutcome};
pub use sink::{ResultSink, SinkError, NO_SELECTION};
pub use stats::{RunStats, StatsThresholds};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_is_send_sync() {
        assert_send::<SequoiaConfig>();
        assert_sync::<SequoiaConfig>();
    }

    #[test]
    fn scan_types_are_send_sync() {
        assert_send::<SymbolOutcome>();
        assert_sync::<SymbolOutcome>();
        assert_send::<ScanResult>();
        assert_sync::<ScanResult>();
    }

    #[test]
    fn notifier_is_send_sync() {
        assert_send::<Box<dyn Notifier>>();
        assert_sync::<Box<dyn Notifier>>();
    }
}
