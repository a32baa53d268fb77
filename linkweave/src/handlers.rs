use anyhow::{Context, Result, anyhow, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use linkweave_core::config::{DEFAULT_CONFIG, LinkweaveConfig};
use linkweave_core::crawl::{CrawlProgress, FrontierScheduler};
use linkweave_core::depth::{DepthPolicyKind, DepthReconciler};
use linkweave_core::graph::GraphStore;
use linkweave_core::metrics::MetricsEngine;
use linkweave_core::persist::{read_json, read_snapshot, write_json, write_snapshot};
use linkweave_core::relevance::RelevanceFilter;
use linkweave_core::report::{
    GraphSummary, RankMetric, ReportFormat, generate_json_summary, generate_text_summary,
};
use linkweave_fetch::{PoliteFetcher, WikipediaFetcher};
use std::any::Any;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const LEADERBOARD_METRICS: [RankMetric; 3] = [
    RankMetric::InDegree,
    RankMetric::PageRank,
    RankMetric::Betweenness,
];

/// Leaderboards worth printing for a loaded graph. The portable JSON carries
/// no betweenness, so that board is only shown for snapshots.
pub fn leaderboard_metrics(has_betweenness: bool) -> &'static [RankMetric] {
    if has_betweenness {
        &LEADERBOARD_METRICS
    } else {
        &LEADERBOARD_METRICS[..2]
    }
}

/// Installs the fmt subscriber. `RUST_LOG` wins over the default level.
pub fn init_tracing(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

pub fn print_banner() {
    println!(
        "{} {}",
        "linkweave".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
    println!("{}", "topic knowledge-graph crawler".bright_black());
    println!();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_header(title: &str) {
    print_divider();
    println!("{}", format!("  {}", title).bright_white().bold());
    print_divider();
    println!();
}

fn print_prompt(msg: &str) -> String {
    print!("{} ", msg.bright_cyan().bold());
    let _ = io::stdout().flush();
    let mut response = String::new();
    if io::stdin().read_line(&mut response).is_err() {
        return String::new();
    }
    response.trim().to_lowercase()
}

/// Reports a fatal error and exits with status 1.
fn fail(e: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "✗".red().bold(), e);
    std::process::exit(1);
}

/// Reads an optional argument, tolerating subcommands that do not define it.
fn opt<'a, T: Any + Clone + Send + Sync + 'static>(args: &'a ArgMatches, id: &str) -> Option<&'a T> {
    args.try_get_one::<T>(id).ok().flatten()
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// The config named by `--config`, or the bundled one.
pub fn load_config(config_path: Option<&str>) -> Result<LinkweaveConfig> {
    match config_path {
        Some(raw) => {
            let path = expand_path(raw);
            LinkweaveConfig::load(&path)
                .with_context(|| format!("loading config {}", path.display()))
        }
        None => LinkweaveConfig::bundled().context("loading bundled config"),
    }
}

/// Applies command-line overrides on top of file values and re-validates.
pub fn apply_overrides(config: &mut LinkweaveConfig, args: &ArgMatches) -> Result<()> {
    if let Some(&max_depth) = opt::<u32>(args, "max-depth") {
        config.crawl.max_depth = max_depth;
    }
    if let Some(&max_nodes) = opt::<usize>(args, "max-nodes") {
        config.crawl.max_nodes = max_nodes;
    }
    if let Some(&delay_ms) = opt::<u64>(args, "delay-ms") {
        config.fetcher.delay_ms = delay_ms;
    }
    if let Some(policy) = opt::<String>(args, "policy") {
        config.depth.policy = DepthPolicyKind::from_str(policy)
            .ok_or_else(|| anyhow!("unknown depth policy '{}'", policy))?;
    }
    if let Some(json) = opt::<String>(args, "json") {
        config.output.json = expand_path(json);
    }
    if let Some(snapshot) = opt::<String>(args, "snapshot") {
        config.output.snapshot = expand_path(snapshot);
    }
    config.validate()?;
    Ok(())
}

pub fn resolve_config(args: &ArgMatches) -> Result<LinkweaveConfig> {
    let mut config = load_config(opt::<String>(args, "config").map(String::as_str))?;
    apply_overrides(&mut config, args)?;
    Ok(config)
}

fn persist(graph: &GraphStore, config: &LinkweaveConfig) -> Result<()> {
    write_json(graph, &config.output.json)
        .with_context(|| format!("writing {}", config.output.json.display()))?;
    write_snapshot(graph, &config.output.snapshot)
        .with_context(|| format!("writing {}", config.output.snapshot.display()))?;
    println!(
        "{} Saved {} and {}",
        "✓".green().bold(),
        config.output.json.display().to_string().bright_white(),
        config.output.snapshot.display().to_string().bright_white()
    );
    Ok(())
}

fn spinner(quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

pub fn handle_init(args: &ArgMatches) {
    if let Err(e) = run_init(args) {
        fail(e);
    }
}

fn run_init(args: &ArgMatches) -> Result<()> {
    print_header("LINKWEAVE INITIALIZATION");

    let raw = opt::<String>(args, "PATH").map_or("linkweave.toml", String::as_str);
    let force = args.get_flag("force");
    let path = expand_path(raw);

    println!(
        "{} Target: {}",
        "→".blue(),
        path.display().to_string().bright_white()
    );
    println!();

    if path.exists() && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("Configuration file already exists:");
        println!(
            "  {} {}",
            "•".yellow(),
            path.display().to_string().bright_white()
        );
        println!();

        let response = print_prompt("Do you want to overwrite it? [y/N]:");
        println!();
        if response != "y" && response != "yes" {
            println!("{} Initialization cancelled.", "✗".red().bold());
            return Ok(());
        }
    }

    write_default_config(&path)?;

    let config = LinkweaveConfig::bundled()?;
    println!(
        "{} Configuration written: {} ({} seeds, {} keywords)",
        "✓".green().bold(),
        path.display().to_string().bright_white(),
        config.seeds.len().to_string().cyan(),
        config.keywords.len().to_string().cyan()
    );
    println!();
    Ok(())
}

/// Writes the bundled configuration, creating parent directories as needed.
pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub async fn handle_crawl(args: &ArgMatches) {
    if let Err(e) = run_crawl(args).await {
        fail(e);
    }
}

async fn run_crawl(args: &ArgMatches) -> Result<()> {
    let config = resolve_config(args)?;
    if config.seeds.is_empty() {
        bail!("no seed topics configured");
    }
    let quiet = args.get_flag("quiet");
    let top = opt::<usize>(args, "top").copied().unwrap_or(10);

    print_header("LINKWEAVE CRAWL");
    println!("{} Seeds: {}", "→".blue(), config.seeds.len());
    println!("{} Keywords: {}", "→".blue(), config.keywords.len());
    println!(
        "{} Max depth: {}, max nodes: {}",
        "→".blue(),
        config.crawl.max_depth,
        config.crawl.max_nodes
    );
    println!("{} Delay: {}ms", "→".blue(), config.fetcher.delay_ms);
    println!();

    let fetcher = WikipediaFetcher::with_options(
        &config.fetcher.endpoint,
        config.fetcher.timeout_secs,
        &config.fetcher.user_agent,
    )?;
    let fetcher =
        PoliteFetcher::new(fetcher).with_delay(Duration::from_millis(config.fetcher.delay_ms));

    let pb = spinner(quiet)?;
    let max_nodes = config.crawl.max_nodes;
    let progress = pb.clone();
    let scheduler = FrontierScheduler::new(
        fetcher,
        RelevanceFilter::new(&config.keywords),
        config.crawl.clone(),
    )
    .with_progress_callback(Arc::new(move |event: CrawlProgress| match event {
        CrawlProgress::Processing {
            topic,
            depth,
            nodes,
            queued,
        } => progress.set_message(format!(
            "[{}/{}] depth {} {} ({} queued)",
            nodes, max_nodes, depth, topic, queued
        )),
        CrawlProgress::Skipped { topic, kind } => {
            progress.set_message(format!("skipped {} ({:?})", topic, kind));
        }
    }));

    let outcome = scheduler.crawl(&config.seeds).await;
    pb.finish_and_clear();

    let mut graph = outcome.graph;
    println!(
        "{} Crawl complete: {} fetched, {} skipped, {} abandoned in queue",
        "✓".green().bold(),
        outcome.stats.fetched,
        outcome.stats.failed,
        outcome.stats.abandoned
    );
    persist(&graph, &config)?;
    print!(
        "{}",
        generate_text_summary("Crawl", &GraphSummary::from_graph(&graph))
    );

    let report = MetricsEngine::new(config.metrics.clone()).compute(&mut graph);
    if let Some(ref e) = report.pagerank_fallback {
        warn!("PageRank fell back to in-degree proxy: {}", e);
    }
    if let Some(ref e) = report.betweenness_fallback {
        warn!("Betweenness fell back to zero: {}", e);
    }
    println!(
        "{} Metrics computed in {}ms",
        "✓".green().bold(),
        report.duration_ms
    );
    persist(&graph, &config)?;

    let summary =
        GraphSummary::from_graph(&graph).with_leaderboards(&graph, &LEADERBOARD_METRICS, top);
    print!("{}", generate_text_summary("Metrics", &summary));
    Ok(())
}

pub fn handle_reconcile(args: &ArgMatches) {
    if let Err(e) = run_reconcile(args) {
        fail(e);
    }
}

fn run_reconcile(args: &ArgMatches) -> Result<()> {
    let config = resolve_config(args)?;

    print_header("DEPTH RECONCILIATION");
    println!(
        "{} Policy: {}",
        "→".blue(),
        config.depth.policy.as_str().bright_white()
    );
    println!(
        "{} Snapshot: {}",
        "→".blue(),
        config.output.snapshot.display().to_string().bright_white()
    );
    println!();

    let (mut graph, meta) = read_snapshot(&config.output.snapshot)
        .with_context(|| format!("loading {}", config.output.snapshot.display()))?;
    println!(
        "{} Loaded {} nodes, {} edges (run {})",
        "✓".green().bold(),
        graph.node_count(),
        graph.edge_count(),
        meta.run_id
    );

    let reconciler = DepthReconciler::from_config(&config.depth, config.seeds.clone());
    let report = reconciler.apply(&mut graph);

    println!();
    print!("{}", format_depth_change(&report.before, &report.after));
    println!(
        "{} {} nodes changed depth",
        "✓".green().bold(),
        report.changed
    );
    persist(&graph, &config)?;
    print!(
        "{}",
        generate_text_summary("Reconcile", &GraphSummary::from_graph(&graph))
    );
    Ok(())
}

/// Side-by-side before/after depth histogram.
pub fn format_depth_change(before: &BTreeMap<u32, usize>, after: &BTreeMap<u32, usize>) -> String {
    let mut depths: Vec<u32> = before.keys().chain(after.keys()).copied().collect();
    depths.sort_unstable();
    depths.dedup();

    let mut out = String::from("Depth   before   after\n");
    for depth in depths {
        out.push_str(&format!(
            "{:>5}   {:>6}   {:>5}\n",
            depth,
            before.get(&depth).copied().unwrap_or(0),
            after.get(&depth).copied().unwrap_or(0)
        ));
    }
    out
}

pub fn handle_inspect(args: &ArgMatches) {
    if let Err(e) = run_inspect(args) {
        fail(e);
    }
}

fn run_inspect(args: &ArgMatches) -> Result<()> {
    let config = resolve_config(args)?;
    let format = opt::<String>(args, "format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);
    let top = opt::<usize>(args, "top").copied().unwrap_or(10);

    let from_snapshot = opt::<String>(args, "snapshot").is_some();
    let (graph, source) = if from_snapshot {
        let (graph, _) = read_snapshot(&config.output.snapshot)
            .with_context(|| format!("loading {}", config.output.snapshot.display()))?;
        (graph, &config.output.snapshot)
    } else {
        let graph = read_json(&config.output.json)
            .with_context(|| format!("loading {}", config.output.json.display()))?;
        (graph, &config.output.json)
    };

    let summary = GraphSummary::from_graph(&graph).with_leaderboards(
        &graph,
        leaderboard_metrics(from_snapshot),
        top,
    );
    let rendered = match format {
        ReportFormat::Text => generate_text_summary(&source.display().to_string(), &summary),
        ReportFormat::Json => generate_json_summary(&summary)?,
    };

    match opt::<PathBuf>(args, "output") {
        Some(path) => {
            fs::write(path, &rendered).with_context(|| format!("writing {}", path.display()))?;
            println!(
                "{} Summary saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", rendered),
    }
    Ok(())
}
