//! Sequoia CLI — daily stock scan and data-pipeline inspection.
//!
//! Commands:
//! - `scan`: resolve the universe, fetch every symbol, run signals, write results
//! - `universe`: resolve and print the symbol universe
//! - `fetch`: run one symbol through the data waterfall
//! - `signals`: list the registered signals

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use sequoia_core::data::{DataWaterfall, ResilientClient, SeriesFetcher, TushareApi};
use sequoia_core::domain::TickerSymbol;
use sequoia_core::signal::{create_signal, create_signals, SignalSpec, SIGNAL_NAMES};
use sequoia_core::universe::{
    EastmoneyListing, ListingChannel, TushareListing, UniverseCache, UniverseResolver, UniverseSnapshot,
    UniverseSource,
};
use sequoia_runner::{
    run_scan, select_notifier, stats_message, strategy_message, ResultSink, ScanResult, SequoiaConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sequoia", about = "Sequoia — A-share daily signal scanner")]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true, env = "SEQUOIA_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level regardless of RUST_LOG.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the universe and write the selected symbols.
    Scan(ScanArgs),
    /// Resolve the symbol universe and print it.
    Universe {
        /// Print the snapshot as JSON instead of one symbol per line.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Fetch one symbol through the data waterfall.
    Fetch {
        /// Symbol, e.g. 600519.SH or 600519.
        symbol: String,

        /// Number of trailing bars to print.
        #[arg(long, default_value_t = 5)]
        tail: usize,

        /// Print the whole series as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List the registered signals.
    Signals,
}

#[derive(Args)]
struct ScanArgs {
    /// Worker threads. 1 scans sequentially.
    #[arg(long)]
    workers: Option<usize>,

    /// Stop starting new symbols after this many seconds.
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Result file path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Scan these symbols instead of resolving the universe (comma-separated).
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// Signals to run, overriding the config (repeatable).
    #[arg(long = "signal")]
    signals: Vec<String>,

    /// Skip push notifications.
    #[arg(long, default_value_t = false)]
    no_push: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = SequoiaConfig::load(cli.config.as_deref())?;
    fill_push_from_env(&mut config);

    match cli.command {
        Commands::Scan(args) => run_scan_cmd(config, args),
        Commands::Universe { json } => run_universe(&config, json),
        Commands::Fetch { symbol, tail, json } => run_fetch(&config, &symbol, tail, json),
        Commands::Signals => run_signals(),
    }
}

/// Logs go to stderr so stdout stays clean for command output.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read once at startup. `SEQUOIA_TUSHARE_TOKEN` wins over `TS_TOKEN`.
fn tushare_token() -> Option<String> {
    env_var("SEQUOIA_TUSHARE_TOKEN").or_else(|| env_var("TS_TOKEN"))
}

fn fill_push_from_env(config: &mut SequoiaConfig) {
    let push = &mut config.push;
    if push.pushplus_token.is_none() {
        push.pushplus_token = env_var("PUSHPLUS_TOKEN");
    }
    if push.wxpusher_token.is_none() {
        push.wxpusher_token = env_var("WXPUSHER_TOKEN");
    }
    if push.wxpusher_uid.is_none() {
        push.wxpusher_uid = env_var("WXPUSHER_UID");
    }
}

/// Shared upstream plumbing, built once per process.
struct Pipeline {
    client: Arc<ResilientClient>,
    tushare: Arc<TushareApi>,
}

impl Pipeline {
    fn new(config: &SequoiaConfig) -> Result<Self> {
        let client = Arc::new(
            ResilientClient::with_reqwest(config.http.retry_policy()).context("failed to build HTTP client")?,
        );
        let token = tushare_token();
        if token.is_none() {
            warn!("no tushare token set, tushare source and listing disabled");
        }
        let tushare = Arc::new(TushareApi::new(client.clone(), token));
        Ok(Self { client, tushare })
    }

    fn waterfall(&self, config: &SequoiaConfig) -> DataWaterfall {
        DataWaterfall::standard(
            self.client.clone(),
            self.tushare.clone(),
            config.sources.snapshot_timeout(),
            &config.sources.waterfall_config(),
        )
    }

    fn resolve_universe(&self, config: &SequoiaConfig) -> Result<UniverseSnapshot> {
        let channels: Vec<Box<dyn ListingChannel>> = vec![
            Box::new(EastmoneyListing::new(self.client.clone())),
            Box::new(TushareListing::new(self.tushare.clone())),
        ];
        let resolver = UniverseResolver::new(
            channels,
            UniverseCache::new(config.universe.cache_path.clone()),
            config.universe.resolver_config(),
        );
        let snapshot = resolver.resolve().context("failed to resolve symbol universe")?;
        info!(
            symbols = snapshot.len(),
            source = %snapshot.source(),
            fingerprint = snapshot.fingerprint(),
            "universe ready"
        );
        Ok(snapshot)
    }
}

fn parse_symbols(raw: &[String]) -> Result<Vec<TickerSymbol>> {
    raw.iter()
        .map(|s| TickerSymbol::parse(s).with_context(|| format!("invalid symbol {s:?}")))
        .collect()
}

fn run_scan_cmd(mut config: SequoiaConfig, args: ScanArgs) -> Result<()> {
    if let Some(workers) = args.workers {
        config.scan.workers = workers;
    }
    if args.deadline_secs.is_some() {
        config.scan.deadline_secs = args.deadline_secs;
    }
    if let Some(output) = &args.output {
        config.output.result_path = output.clone();
    }
    if !args.signals.is_empty() {
        config.signals = args.signals.iter().map(SignalSpec::new).collect();
    }

    let sink = ResultSink::from_config(&config.output);
    let mut client = None;
    let outcome = Pipeline::new(&config).and_then(|pipeline| {
        let result = execute_scan(&config, &args, &pipeline)?;
        client = Some(pipeline.client);
        Ok(result)
    });

    let result = match sink.finalize(outcome) {
        Ok(result) => result,
        Err(e) => {
            // Debug form carries the context chain and, with RUST_BACKTRACE, the backtrace
            error!("scan failed: {e:?}");
            std::process::exit(1);
        }
    };

    println!(
        "Scanned {} symbols ({} fetched, {} skipped, {} errored), selected {}",
        result.universe_size,
        result.fetched,
        result.skipped,
        result.errored,
        result.selected.len()
    );
    if result.deadline_expired {
        println!("Deadline expired: {} symbols not scanned", result.deadline_skipped);
    }
    println!("Results written to {}", sink.result_path().display());

    if let (false, Some(client)) = (args.no_push, client) {
        let notifier = select_notifier(&config.push, client);
        notifier.notify(&config.push.title, &strategy_message(&result));
        notifier.notify(&format!("{} · 统计", config.push.title), &stats_message(&result));
    }
    Ok(())
}

fn execute_scan(config: &SequoiaConfig, args: &ScanArgs, pipeline: &Pipeline) -> Result<ScanResult> {
    let signals = create_signals(&config.signals).context("invalid signal configuration")?;

    let universe = if args.symbols.is_empty() {
        pipeline.resolve_universe(config)?
    } else {
        UniverseSnapshot::from_symbols(parse_symbols(&args.symbols)?, UniverseSource::Explicit)
    };

    let waterfall = pipeline.waterfall(config);
    run_scan(&universe, &waterfall, &signals, &config.scan.scan_options()).context("scan failed")
}

fn run_universe(config: &SequoiaConfig, json: bool) -> Result<()> {
    let snapshot = Pipeline::new(config)?.resolve_universe(config)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        for symbol in snapshot.symbols() {
            println!("{symbol}");
        }
    }
    Ok(())
}

fn run_fetch(config: &SequoiaConfig, raw: &str, tail: usize, json: bool) -> Result<()> {
    let symbol = TickerSymbol::parse(raw).with_context(|| format!("invalid symbol {raw:?}"))?;
    let waterfall = Pipeline::new(config)?.waterfall(config);

    let Some(sourced) = waterfall.fetch(&symbol) else {
        bail!("no source returned data for {symbol}");
    };
    let series = &sourced.series;

    if json {
        println!("{}", serde_json::to_string_pretty(series)?);
        return Ok(());
    }

    println!(
        "{symbol}: {} bars from {} ({} .. {})",
        series.len(),
        sourced.source,
        series.first().date,
        series.last().date
    );
    println!("{:<12} {:>10} {:>10} {:>10} {:>10} {:>14}", "date", "open", "high", "low", "close", "volume");
    let bars = series.bars();
    for bar in &bars[bars.len().saturating_sub(tail)..] {
        println!(
            "{:<12} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>14.0}",
            bar.date.to_string(),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        );
    }
    if let Some(change) = series.last_change_pct() {
        println!("last change: {change:+.2}%");
    }
    Ok(())
}

fn run_signals() -> Result<()> {
    for name in SIGNAL_NAMES {
        let signal = create_signal(&SignalSpec::new(*name))?;
        println!("{:<14} warmup {} bars", signal.name(), signal.warmup_bars());
    }
    Ok(())
}
