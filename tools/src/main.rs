//! impact-runner: headless runner for the seller impact model.
//!
//! Usage:
//!   impact-runner --data-dir ./olist
//!   impact-runner --db raw.db --remove 400
//!   impact-runner --synthetic --seed 7 --sellers 500 --orders 20000 --curve
//!   impact-runner --data-dir ./olist --preset linear_opex --ipc-mode

use anyhow::{anyhow, Result};
use seller_impact_core::{
    config::{ImpactConfig, InfraCostModel},
    csv_source::CsvDirectory,
    pipeline::AggregationReport,
    raw::RawDataSource,
    scenario::{CurvePoint, OptimalCutoff, PnlBreakdown, ScenarioComparison, ScenarioResult},
    session::{Generation, ImpactSession},
    store::RawStore,
    synthetic::{DatasetShape, SyntheticSource},
    types::GenerationId,
};
use std::collections::BTreeMap;
use std::env;
use std::io::{self, BufRead, Write};

type Session = ImpactSession<Box<dyn RawDataSource>>;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Evaluate { remove: usize },
    Curve,
    Optimal,
    Refresh,
    Quit,
}

#[derive(serde::Serialize)]
struct UiState {
    generation: GenerationId,
    source: &'static str,
    n_sellers: usize,
    baseline: ScenarioResult,
    breakdown: PnlBreakdown,
    optimal: OptimalCutoff,
    coerced_timestamps: BTreeMap<String, usize>,
    reviews_without_score: usize,
}

#[derive(serde::Serialize)]
struct EvaluateReply {
    comparison: ScenarioComparison,
    breakdown: PnlBreakdown,
}

#[derive(serde::Serialize)]
struct CurveReply {
    generation: GenerationId,
    curve: Vec<CurvePoint>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let curve_mode = args.iter().any(|a| a == "--curve");
    let remove: Option<usize> = parse_opt(&args, "--remove")?;

    let source = open_source(&args)?;
    let config = build_config(&args)?;

    if !ipc_mode && !curve_mode {
        println!("Seller impact: impact-runner");
        println!("  source:     {}", source.name());
        println!("  infra:      {}", describe_infra(&config.infrastructure));
        println!("  commission: {:.2}", config.profitability.commission_rate);
        println!("  subscr.:    {:.2}/month", config.profitability.subscription_per_month);
        println!();
    }

    let session = ImpactSession::new(source, config);

    if ipc_mode {
        run_ipc_loop(&session)?;
    } else if curve_mode {
        print_curve(&session)?;
    } else {
        let generation = session.generation()?;
        print_summary(&session, &generation)?;
        if let Some(k) = remove {
            println!();
            print_comparison(&generation, k);
        }
    }

    Ok(())
}

// ── Inputs ─────────────────────────────────────────────────────────

fn open_source(args: &[String]) -> Result<Box<dyn RawDataSource>> {
    if let Some(dir) = flag_value(args, "--data-dir") {
        return Ok(Box::new(CsvDirectory::new(dir)));
    }
    if let Some(db) = flag_value(args, "--db") {
        return Ok(Box::new(RawStore::open_read_only(db)?));
    }
    if !args.iter().any(|a| a == "--synthetic") {
        log::info!("no --data-dir or --db given; using a synthetic dataset");
    }
    let seed = parse_arg(args, "--seed", 42u64);
    let defaults = DatasetShape::default();
    let shape = DatasetShape {
        sellers: parse_arg(args, "--sellers", defaults.sellers),
        orders: parse_arg(args, "--orders", defaults.orders),
        ..defaults
    };
    Ok(Box::new(SyntheticSource::new(seed, shape)))
}

/// `--config` wins over `--preset`; scalar overrides apply on top of either.
fn build_config(args: &[String]) -> Result<ImpactConfig> {
    let mut config = match (flag_value(args, "--config"), flag_value(args, "--preset")) {
        (Some(path), preset) => {
            if preset.is_some() {
                log::warn!("--preset ignored because --config was given");
            }
            ImpactConfig::load(path)?
        }
        (None, Some(name)) => ImpactConfig::preset(name).ok_or_else(|| {
            anyhow!("Unknown preset '{name}'; expected one of {:?}", ImpactConfig::PRESETS)
        })?,
        (None, None) => ImpactConfig::default(),
    };

    if let Some(rate) = parse_opt(args, "--commission")? {
        config.profitability.commission_rate = rate;
    }
    if let Some(amount) = parse_opt(args, "--subscription")? {
        config.profitability.subscription_per_month = amount;
    }
    if let Some(step) = parse_opt(args, "--sample-step")? {
        config.search.sample_step = step;
    }

    let new_alpha: Option<f64> = parse_opt(args, "--alpha")?;
    let new_beta: Option<f64> = parse_opt(args, "--beta")?;
    match &mut config.infrastructure {
        InfraCostModel::SquareRoot { alpha, beta } => {
            if let Some(a) = new_alpha {
                *alpha = a;
            }
            if let Some(b) = new_beta {
                *beta = b;
            }
        }
        InfraCostModel::Linear { .. } => {
            if new_alpha.is_some() || new_beta.is_some() {
                log::warn!("--alpha/--beta ignored: infrastructure model is linear");
            }
        }
    }

    Ok(config)
}

// ── IPC ────────────────────────────────────────────────────────────

fn run_ipc_loop(session: &Session) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                write_error(&mut stdout, &e.to_string())?;
                continue;
            }
        };
        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        match handle_command(session, cmd) {
            Ok(reply) => writeln!(stdout, "{reply}")?,
            Err(e) => {
                log::warn!("command failed: {e:#}");
                write_error(&mut stdout, &format!("{e:#}"))?;
                continue;
            }
        }
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(session: &Session, cmd: IpcCommand) -> Result<String> {
    let reply = match cmd {
        IpcCommand::GetState => serde_json::to_string(&build_ui_state(session, &*session.generation()?))?,
        IpcCommand::Refresh => serde_json::to_string(&build_ui_state(session, &*session.refresh()?))?,
        IpcCommand::Evaluate { remove } => {
            let generation = session.generation()?;
            serde_json::to_string(&EvaluateReply {
                comparison: generation.engine.compare(remove),
                breakdown: generation.engine.breakdown(remove),
            })?
        }
        IpcCommand::Curve => {
            let generation = session.generation()?;
            serde_json::to_string(&CurveReply {
                generation: generation.id,
                curve: generation.engine.curve(),
            })?
        }
        IpcCommand::Optimal => {
            let generation = session.generation()?;
            serde_json::to_string(&generation.engine.optimal(&session.config().search))?
        }
        IpcCommand::Quit => return Err(anyhow!("quit is handled by the loop")),
    };
    Ok(reply)
}

fn write_error(out: &mut impl Write, message: &str) -> Result<()> {
    let err_json = serde_json::json!({ "error": message });
    writeln!(out, "{err_json}")?;
    out.flush()?;
    Ok(())
}

fn build_ui_state(session: &Session, generation: &Generation) -> UiState {
    let AggregationReport {
        coerced_timestamps,
        reviews_without_score,
        ..
    } = generation.table.report.clone();
    UiState {
        generation: generation.id,
        source: session.source().name(),
        n_sellers: generation.table.len(),
        baseline: generation.baseline,
        breakdown: generation.engine.breakdown(0),
        optimal: generation.engine.optimal(&session.config().search),
        coerced_timestamps,
        reviews_without_score,
    }
}

// ── Output ─────────────────────────────────────────────────────────

fn print_summary(session: &Session, generation: &Generation) -> Result<()> {
    let table = &generation.table;
    let report = &table.report;

    println!("=== AGGREGATION ===");
    println!("  generation:       {}", generation.id);
    println!(
        "  input rows:       {} sellers, {} items, {} orders, {} reviews",
        report.input_rows.sellers,
        report.input_rows.order_items,
        report.input_rows.orders,
        report.input_rows.reviews
    );
    for step in &report.join_population {
        println!("  after {:<16} {}", format!("{}:", step.stage), step.sellers);
    }
    let coerced: usize = report.coerced_timestamps.values().sum();
    println!("  bad timestamps:   {coerced}");
    println!("  unscored reviews: {}", report.reviews_without_score);
    println!("  dup. profiles:    {}", report.duplicate_profiles);

    let b = generation.engine.breakdown(0);
    println!();
    println!("=== P&L (all sellers) ===");
    println!("  subscription:     {:>14.0}", b.subscription_revenue);
    println!("  commission:       {:>14.0}", b.commission_revenue);
    println!("  revenue:          {:>14.0}", b.revenue);
    println!("  review cost:      {:>14.0}", -b.review_cost);
    println!("  gross profit:     {:>14.0}", b.gross_profit);
    println!("  IT cost:          {:>14.0}", -b.it_cost);
    println!("  net profit:       {:>14.0}", b.net_profit);

    let optimal = generation.engine.optimal(&session.config().search);
    println!();
    println!("=== OPTIMAL CUTOFF ===");
    println!("  remove:           {} of {}", optimal.k, generation.engine.len());
    println!("  net profit:       {:.0}", optimal.net_profit);
    println!("  vs. baseline:     {:+.0}", optimal.net_profit - b.net_profit);
    println!(
        "  search:           {} cutoffs{}",
        optimal.candidates_evaluated,
        if optimal.exhaustive { "" } else { " (sampled)" }
    );
    Ok(())
}

fn print_comparison(generation: &Generation, k: usize) {
    let c = generation.engine.compare(k);
    println!("=== REMOVE {} WORST SELLERS ===", c.removed);
    println!("  kept:             {}", c.kept);
    println!("  items:            {}", c.scenario.n_items);
    println!("  revenue:          {:.0}", c.scenario.revenue);
    println!("  gross profit:     {:.0}", c.scenario.gross_profit_total);
    println!("  IT cost:          {:.0}", c.scenario.it_cost);
    println!("  net profit:       {:.0}", c.scenario.net_profit);
    println!("  vs. baseline:     {:+.0}", c.net_profit_delta);
}

fn print_curve(session: &Session) -> Result<()> {
    let generation = session.generation()?;
    let mut stdout = io::stdout().lock();
    for point in generation.engine.curve() {
        writeln!(stdout, "{}", serde_json::to_string(&point)?)?;
    }
    stdout.flush()?;
    Ok(())
}

fn describe_infra(model: &InfraCostModel) -> String {
    match model {
        InfraCostModel::SquareRoot { alpha, beta } => {
            format!("{alpha}*sqrt(sellers) + {beta}*sqrt(items)")
        }
        InfraCostModel::Linear {
            base,
            per_seller,
            per_item,
        } => format!("{base} + {per_seller}*sellers + {per_item}*items"),
    }
}

// ── Args ───────────────────────────────────────────────────────────

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

/// Like `parse_arg`, but a present flag with a bad value is an error.
fn parse_opt<T: std::str::FromStr>(args: &[String], flag: &str) -> Result<Option<T>> {
    match flag_value(args, flag) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid value for {flag}: '{raw}'")),
    }
}
