//! bibmerge - merge Scopus and Web of Science exports into one ranked table
//!
//! ## Usage
//!
//! ```bash
//! bibmerge process --scopus scopus.csv --wos savedrecs.xls \
//!     --ranking scimagojr_2020.csv --output merged.xlsx \
//!     --keyword-chart keywords.png --citation-chart citations.svg
//!
//! bibmerge keywords --scopus scopus.csv --wos savedrecs.txt --ranking scimagojr_2020.csv
//! ```

use anyhow::{Context, Result, anyhow};
use bibmerge::dedupe::{MissingKeyPolicy, ProvenanceScope};
use bibmerge::normalize::MalformedPolicy;
use bibmerge::{InputFormat, MergeOrder, PipelineConfig, PipelineError, Session, display, export};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

// ============================================================================
// CLI Definition
// ============================================================================

/// Merge, deduplicate, and rank Scopus and Web of Science exports
#[derive(Parser)]
#[command(name = "bibmerge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process the exports and save the merged table
    Process {
        #[command(flatten)]
        inputs: InputArgs,

        /// Where to save the merged table (.xlsx or .csv)
        #[arg(short, long)]
        output: PathBuf,

        /// Also draw the keyword chart to this file (.png or .svg)
        #[arg(long)]
        keyword_chart: Option<PathBuf>,

        /// Also draw the citation chart to this file (.png or .svg)
        #[arg(long)]
        citation_chart: Option<PathBuf>,
    },
    /// Print the merged table
    Show {
        #[command(flatten)]
        inputs: InputArgs,

        /// Print at most this many rows
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print (and optionally chart) the most frequent author keywords
    Keywords {
        #[command(flatten)]
        inputs: InputArgs,

        /// Number of keywords (default from config, 15)
        #[arg(long)]
        top: Option<usize>,

        /// Draw the chart to this file (.png or .svg)
        #[arg(long)]
        chart: Option<PathBuf>,
    },
    /// Print (and optionally chart) the most cited articles
    Citations {
        #[command(flatten)]
        inputs: InputArgs,

        /// Number of articles (default from config, 15)
        #[arg(long)]
        top: Option<usize>,

        /// Draw the chart to this file (.png or .svg)
        #[arg(long)]
        chart: Option<PathBuf>,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Scopus export (.csv or .xlsx)
    #[arg(long)]
    scopus: PathBuf,

    /// Web of Science export (.xls/.xlsx or tab-delimited text)
    #[arg(long)]
    wos: PathBuf,

    /// SCImago-style ranking table (overrides the config file)
    #[arg(long)]
    ranking: Option<PathBuf>,

    /// Put Web of Science records first, so they survive deduplication
    #[arg(long)]
    wos_first: bool,

    /// Never treat two missing key values as a match
    #[arg(long)]
    ignore_missing_keys: bool,

    /// Mark provenance for every key before removing any duplicate
    #[arg(long)]
    merged_provenance: bool,

    /// Skip malformed rows instead of failing
    #[arg(long)]
    skip_malformed: bool,
}

impl InputArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(ranking) = &self.ranking {
            config.ranking.path = Some(ranking.clone());
        }
        if self.wos_first {
            config.merge_order = MergeOrder::WosFirst;
        }
        if self.ignore_missing_keys {
            config.dedupe.missing_keys = MissingKeyPolicy::Ignore;
        }
        if self.merged_provenance {
            config.dedupe.provenance_scope = ProvenanceScope::Merged;
        }
        if self.skip_malformed {
            config.scopus.set_malformed_policy(MalformedPolicy::Skip);
            config.wos.set_malformed_policy(MalformedPolicy::Skip);
        }
    }

    /// The file a parse error came from.
    fn path_for(&self, format: InputFormat, config: &PipelineConfig) -> Option<PathBuf> {
        match format {
            InputFormat::Scopus => Some(self.scopus.clone()),
            InputFormat::WebOfScience => Some(self.wos.clone()),
            InputFormat::Ranking => config.ranking.path.clone(),
            InputFormat::Export => None,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Process {
            inputs,
            output,
            keyword_chart,
            citation_chart,
        } => {
            let session = process(&inputs, &mut config)?;
            let dataset = session.dataset()?;

            export::save_dataset(&output, &dataset.records)
                .with_context(|| format!("Failed to save {}", output.display()))?;
            info!(path = %output.display(), records = dataset.len(), "Export complete");

            if let Some(path) = keyword_chart {
                draw_keywords(&dataset.keyword_frequency(), &path, config.top_n)?;
            }
            if let Some(path) = citation_chart {
                draw_citations(&dataset.citation_ranking(), &path, config.top_n)?;
            }
            Ok(())
        }
        Commands::Show { inputs, limit } => {
            let session = process(&inputs, &mut config)?;
            display::print_dataset(session.dataset()?, limit);
            Ok(())
        }
        Commands::Keywords { inputs, top, chart } => {
            let session = process(&inputs, &mut config)?;
            let frequency = session.dataset()?.keyword_frequency();
            let top = top.unwrap_or(config.top_n);

            display::print_keywords(&frequency, top);
            if let Some(path) = chart {
                draw_keywords(&frequency, &path, top)?;
            }
            Ok(())
        }
        Commands::Citations { inputs, top, chart } => {
            let session = process(&inputs, &mut config)?;
            let dataset = session.dataset()?;
            let ranking = dataset.citation_ranking();
            let top = top.unwrap_or(config.top_n);

            display::print_citations(&ranking, dataset, top);
            if let Some(path) = chart {
                draw_citations(&ranking, &path, top)?;
            }
            Ok(())
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn process(inputs: &InputArgs, config: &mut PipelineConfig) -> Result<Session> {
    inputs.apply(config);

    let mut session = Session::new(config.clone());
    session
        .set_scopus_path(&inputs.scopus)
        .set_wos_path(&inputs.wos);

    session
        .process()
        .map(|_| ())
        .map_err(|err| describe_failure(err, inputs, config))?;
    Ok(session)
}

/// Names the input file a pipeline error came from.
fn describe_failure(err: PipelineError, inputs: &InputArgs, config: &PipelineConfig) -> anyhow::Error {
    let PipelineError::Parse(parse_err) = &err else {
        return anyhow!(err).context("Processing failed");
    };
    let Some(path) = inputs.path_for(parse_err.format, config) else {
        return anyhow!(err).context("Processing failed");
    };

    #[cfg(feature = "diagnostics")]
    if let Ok(source) = std::fs::read_to_string(&path) {
        eprintln!("{}", parse_err.to_diagnostic(&path.display().to_string(), &source));
    }

    anyhow!(err).context(format!("Failed to read {}", path.display()))
}

#[cfg(feature = "charts")]
fn draw_keywords(frequency: &bibmerge::KeywordFrequency, path: &Path, top: usize) -> Result<()> {
    bibmerge::charts::render_keyword_chart(frequency, path, top)
        .with_context(|| format!("Failed to draw keyword chart {}", path.display()))
}

#[cfg(feature = "charts")]
fn draw_citations(ranking: &bibmerge::CitationRanking, path: &Path, top: usize) -> Result<()> {
    bibmerge::charts::render_citation_chart(ranking, path, top)
        .with_context(|| format!("Failed to draw citation chart {}", path.display()))
}

#[cfg(not(feature = "charts"))]
fn draw_keywords(_: &bibmerge::KeywordFrequency, path: &Path, _: usize) -> Result<()> {
    Err(anyhow!(
        "Cannot draw {}: bibmerge was built without the `charts` feature",
        path.display()
    ))
}

#[cfg(not(feature = "charts"))]
fn draw_citations(_: &bibmerge::CitationRanking, path: &Path, _: usize) -> Result<()> {
    Err(anyhow!(
        "Cannot draw {}: bibmerge was built without the `charts` feature",
        path.display()
    ))
}
