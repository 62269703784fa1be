//! Run configuration loaded from TOML.
//!
//! Every section and field defaults, so a missing or empty file yields the
//! stock setup: the standard three-source waterfall, a 1000-symbol floor on
//! remote listings, sequential scanning and `data/stock.db` as the result
//! file. The config is built once and passed down; nothing reads it globally.

use sequoia_core::data::{DataSource, Method, RetryPolicy, WaterfallConfig};
use sequoia_core::signal::SignalSpec;
use sequoia_core::universe::{ResolverConfig, DEFAULT_FALLBACK};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::scan::ScanOptions;
use crate::stats::StatsThresholds;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequoiaConfig {
    pub http: HttpConfig,
    pub sources: SourcesConfig,
    pub universe: UniverseConfig,
    pub scan: ScanConfig,
    pub output: OutputConfig,
    pub signals: Vec<SignalSpec>,
    pub push: PushConfig,
}

impl Default for SequoiaConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            sources: SourcesConfig::default(),
            universe: UniverseConfig::default(),
            scan: ScanConfig::default(),
            output: OutputConfig::default(),
            signals: vec![SignalSpec::new("ma_crossover")],
            push: PushConfig::default(),
        }
    }
}

impl SequoiaConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Defaults when no path is given; a given path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

/// `[http]`: retry budget and timeouts for every outbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_secs: u64,
    pub retry_statuses: Vec<u16>,
    pub retry_methods: Vec<Method>,
    pub default_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_secs: policy.max_delay.as_secs(),
            retry_statuses: policy.retry_statuses,
            retry_methods: policy.retry_methods,
            default_timeout_secs: policy.default_timeout.as_secs(),
        }
    }
}

impl HttpConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_secs(self.max_delay_secs),
            retry_statuses: self.retry_statuses.clone(),
            retry_methods: self.retry_methods.clone(),
            default_timeout: Duration::from_secs(self.default_timeout_secs),
        }
    }
}

/// `[sources]`: waterfall behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub lookback_days: u32,
    /// Per-request timeout of the snapshot source, below the client default.
    pub snapshot_timeout_secs: u64,
    pub breaker_threshold: u32,
    pub breaker_cooldown_secs: u64,
    pub disabled: Vec<DataSource>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        let waterfall = WaterfallConfig::default();
        Self {
            lookback_days: waterfall.lookback_days,
            snapshot_timeout_secs: 5,
            breaker_threshold: waterfall.breaker_threshold,
            breaker_cooldown_secs: waterfall.breaker_cooldown.as_secs(),
            disabled: waterfall.disabled,
        }
    }
}

impl SourcesConfig {
    pub fn waterfall_config(&self) -> WaterfallConfig {
        WaterfallConfig {
            lookback_days: self.lookback_days,
            breaker_threshold: self.breaker_threshold,
            breaker_cooldown: Duration::from_secs(self.breaker_cooldown_secs),
            disabled: self.disabled.clone(),
        }
    }

    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_secs(self.snapshot_timeout_secs)
    }
}

/// `[universe]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    pub cache_path: PathBuf,
    pub min_viable: usize,
    pub fallback: Vec<String>,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        let resolver = ResolverConfig::default();
        Self {
            cache_path: PathBuf::from("data/universe.txt"),
            min_viable: resolver.min_viable,
            fallback: DEFAULT_FALLBACK.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl UniverseConfig {
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            min_viable: self.min_viable,
            fallback: self.fallback.clone(),
        }
    }
}

/// `[scan]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// 1 scans on the calling thread; more builds a worker pool of that size.
    pub workers: usize,
    pub deadline_secs: Option<u64>,
    pub progress_every: usize,
    pub gain_threshold_pct: f64,
    pub loss_threshold_pct: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let thresholds = StatsThresholds::default();
        Self {
            workers: 1,
            deadline_secs: None,
            progress_every: 100,
            gain_threshold_pct: thresholds.gain_pct,
            loss_threshold_pct: thresholds.loss_pct,
        }
    }
}

impl ScanConfig {
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            workers: self.workers.max(1),
            deadline: self.deadline_secs.map(Duration::from_secs),
            progress_every: self.progress_every.max(1),
            thresholds: StatsThresholds {
                gain_pct: self.gain_threshold_pct,
                loss_pct: self.loss_threshold_pct,
            },
        }
    }
}

/// `[output]`: the result file is always written; the rest only when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub result_path: PathBuf,
    pub summary_path: Option<PathBuf>,
    pub hits_csv_path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            result_path: PathBuf::from("data/stock.db"),
            summary_path: None,
            hits_csv_path: None,
        }
    }
}

/// `[push]`: tokens may also come from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    pub pushplus_token: Option<String>,
    pub wxpusher_token: Option<String>,
    pub wxpusher_uid: Option<String>,
    pub title: String,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            pushplus_token: None,
            wxpusher_token: None,
            wxpusher_uid: None,
            title: "Sequoia 选股日报".to_string(),
        }
    }
}
