//! step-to-json - STEP assembly structure to JSON
//!
//! Reads the product structure of a STEP file and writes it as a nested
//! JSON tree next to the input.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Instant;
use step_tree::{
    read_assembly, DescendantCountDecorator, Diagnostic, NameStrategy, NodeDecorator, Phase,
    Progress, ProgressEvent, ReadOptions, UuidDecorator, DEFAULT_MAX_DEPTH,
};

#[derive(Parser)]
#[command(name = "step-to-json")]
#[command(about = "Convert the assembly structure of a STEP file to JSON", long_about = None)]
struct Cli {
    /// Input STEP file (.stp or .step)
    input: PathBuf,
    /// Output file (default: input with a .json extension)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// How part names are resolved
    #[arg(long, value_enum, default_value_t = Naming::Auto)]
    naming: Naming,
    /// Fail on dangling or unresolved references instead of skipping them
    #[arg(long)]
    strict: bool,
    /// Deepest assembly nesting accepted
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,
    /// Attach a random UUID to every occurrence
    #[arg(long)]
    uuid: bool,
    /// Attach the number of descendants to every occurrence
    #[arg(long, conflicts_with = "uuid")]
    descendants: bool,
    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
    /// Hide progress bars
    #[arg(short, long)]
    quiet: bool,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum Naming {
    /// Indirect if the file has PRODUCT records, else direct
    Auto,
    /// Use each PRODUCT_DEFINITION's own name
    Direct,
    /// Follow PRODUCT_DEFINITION -> formation -> PRODUCT
    Indirect,
}

impl From<Naming> for NameStrategy {
    fn from(naming: Naming) -> Self {
        match naming {
            Naming::Auto => NameStrategy::Auto,
            Naming::Direct => NameStrategy::Direct,
            Naming::Indirect => NameStrategy::Indirect,
        }
    }
}

struct Summary {
    output: PathBuf,
    relations: usize,
    products: usize,
    diagnostics: Vec<Diagnostic>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let start = Instant::now();
    let summary = run(&cli)?;

    println!("Success! Wrote {}", summary.output.display());
    println!("Elapsed time: {:.2?}", start.elapsed());
    for line in summary_lines(&summary) {
        println!("{line}");
    }
    Ok(())
}

fn summary_lines(summary: &Summary) -> Vec<String> {
    let mut lines = vec![
        format!("Analysed relations:                  {}", summary.relations),
        format!("Analysed assemblies and components:  {}", summary.products),
    ];
    if !summary.diagnostics.is_empty() {
        lines.push(format!(
            "Diagnostics:                         {}",
            summary.diagnostics.len()
        ));
        lines.extend(summary.diagnostics.iter().map(|d| format!("  - {d}")));
    }
    lines
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

fn run(cli: &Cli) -> Result<Summary> {
    if !cli.input.is_file() {
        bail!("Specified file could not be found: {}", cli.input.display());
    }

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));
    let options = ReadOptions {
        naming: cli.naming.into(),
        strict: cli.strict,
        max_depth: cli.max_depth,
    };

    let mut uuid = UuidDecorator;
    let mut descendants = DescendantCountDecorator;
    let decorator: Option<&mut dyn NodeDecorator> = if cli.uuid {
        Some(&mut uuid)
    } else if cli.descendants {
        Some(&mut descendants)
    } else {
        None
    };

    let (progress, renderer) = if cli.quiet {
        (Progress::none(), None)
    } else {
        let (progress, events) = Progress::channel();
        let handle = std::thread::spawn(move || render_progress(events));
        (progress, Some(handle))
    };

    let result = read_assembly(&cli.input, &options, decorator, &progress);

    // Closing the channel lets the renderer drain and exit
    drop(progress);
    if let Some(handle) = renderer {
        join_renderer(handle);
    }

    let outcome =
        result.with_context(|| format!("failed to read assembly from {}", cli.input.display()))?;

    let json = if cli.pretty {
        outcome.tree.to_json_pretty()?
    } else {
        outcome.tree.to_json()?
    };
    std::fs::write(&output, json)
        .with_context(|| format!("failed to write {}", output.display()))?;

    Ok(Summary {
        output,
        relations: outcome.relation_count,
        products: outcome.product_count,
        diagnostics: outcome.diagnostics,
    })
}

/// Wait for the progress renderer. A panic there only costs the progress
/// display, so it is logged rather than propagated.
fn join_renderer(handle: JoinHandle<()>) -> bool {
    match handle.join() {
        Ok(()) => true,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown cause".to_string());
            tracing::warn!(%reason, "progress renderer panicked");
            false
        }
    }
}

/// Replace the input's extension with `.json`.
fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("json")
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Products => "Parsing products",
        Phase::Relations => "Parsing relations",
        Phase::Build => "Building the output",
    }
}

fn render_progress(events: impl IntoIterator<Item = ProgressEvent>) {
    let multi = MultiProgress::new();
    let style = ProgressStyle::with_template("{spinner:.green} {prefix:<20} {pos:>8} {msg}")
        .expect("progress template is valid");
    let mut bars: HashMap<Phase, ProgressBar> = HashMap::new();

    let mut bar_for = |phase: Phase| {
        bars.entry(phase)
            .or_insert_with(|| {
                let bar = multi.add(ProgressBar::new_spinner());
                bar.set_style(style.clone());
                bar.set_prefix(phase_label(phase));
                bar
            })
            .clone()
    };

    for event in events {
        match event {
            ProgressEvent::Tick { phase, count } => bar_for(phase).set_position(count),
            ProgressEvent::Complete { phase } => bar_for(phase).finish_with_message("done"),
        }
    }
}
