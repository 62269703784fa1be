//! Data waterfall — ordered fallback across source adapters.
//!
//! Adapters are tried strictly in priority order and the first available
//! series wins; later adapters are not invoked. Exhaustion yields `None`,
//! which the scan treats as "skip this symbol".
//!
//! Standard order:
//! 1. Eastmoney: deepest history, needed by moving-average signals
//! 2. Tushare: token-gated, high availability
//! 3. Sina: single bar for today only

use super::circuit_breaker::CircuitBreaker;
use super::eastmoney::EastmoneyAdapter;
use super::http::ResilientClient;
use super::provider::{DataSource, SourceAdapter, SourceResult, SourcedSeries, Unavailable};
use super::sina::SinaAdapter;
use super::tushare::{TushareAdapter, TushareApi};
use crate::domain::TickerSymbol;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Anything that can turn a symbol into a normalized series.
pub trait SeriesFetcher: Send + Sync {
    fn fetch(&self, symbol: &TickerSymbol) -> Option<SourcedSeries>;
}

#[derive(Debug, Clone)]
pub struct WaterfallConfig {
    /// Calendar days of history requested from history-capable sources.
    pub lookback_days: u32,
    pub breaker_threshold: u32,
    pub breaker_cooldown: Duration,
    /// Sources skipped outright, reported as `Unavailable::Disabled`.
    pub disabled: Vec<DataSource>,
}

impl Default for WaterfallConfig {
    fn default() -> Self {
        Self {
            lookback_days: 365,
            breaker_threshold: 5,
            breaker_cooldown: Duration::from_secs(10 * 60),
            disabled: Vec::new(),
        }
    }
}

struct Stage {
    adapter: Box<dyn SourceAdapter>,
    breaker: CircuitBreaker,
    enabled: bool,
}

pub struct DataWaterfall {
    stages: Vec<Stage>,
    lookback_days: u32,
}

impl DataWaterfall {
    /// Build from adapters in priority order.
    pub fn new(adapters: Vec<Box<dyn SourceAdapter>>, config: &WaterfallConfig) -> Self {
        let stages = adapters
            .into_iter()
            .map(|adapter| Stage {
                enabled: !config.disabled.contains(&adapter.source()),
                breaker: CircuitBreaker::new(config.breaker_threshold, config.breaker_cooldown),
                adapter,
            })
            .collect();
        Self {
            stages,
            lookback_days: config.lookback_days,
        }
    }

    /// Eastmoney → Tushare → Sina over a shared client.
    pub fn standard(
        client: Arc<ResilientClient>,
        tushare: Arc<TushareApi>,
        snapshot_timeout: Duration,
        config: &WaterfallConfig,
    ) -> Self {
        Self::new(
            vec![
                Box::new(EastmoneyAdapter::new(client.clone())),
                Box::new(TushareAdapter::new(tushare)),
                Box::new(SinaAdapter::new(client, snapshot_timeout)),
            ],
            config,
        )
    }

    /// Sources in the order they are tried.
    pub fn sources(&self) -> Vec<DataSource> {
        self.stages.iter().map(|s| s.adapter.source()).collect()
    }

    fn attempt(&self, stage: &Stage, symbol: &TickerSymbol) -> SourceResult {
        if !stage.enabled {
            return SourceResult::Unavailable(Unavailable::Disabled);
        }
        if !stage.breaker.is_allowed() {
            return SourceResult::Unavailable(Unavailable::CircuitOpen);
        }

        let result = stage.adapter.fetch(symbol, self.lookback_days);
        match &result {
            SourceResult::Available(_) => stage.breaker.record_success(),
            SourceResult::Unavailable(Unavailable::Network(_)) => {
                if stage.breaker.record_failure() {
                    warn!(
                        source = %stage.adapter.source(),
                        cooldown_secs = stage.breaker.remaining_cooldown().as_secs(),
                        "circuit breaker tripped, skipping source"
                    );
                }
            }
            SourceResult::Unavailable(_) => {}
        }
        result
    }
}

impl SeriesFetcher for DataWaterfall {
    fn fetch(&self, symbol: &TickerSymbol) -> Option<SourcedSeries> {
        for stage in &self.stages {
            let source = stage.adapter.source();
            match self.attempt(stage, symbol) {
                SourceResult::Available(series) => {
                    debug!(%symbol, %source, bars = series.len(), "series acquired");
                    return Some(SourcedSeries { series, source });
                }
                SourceResult::Unavailable(reason) => {
                    debug!(%symbol, %source, %reason, "source unavailable, falling through");
                }
            }
        }
        debug!(%symbol, "all sources exhausted");
        None
    }
}
