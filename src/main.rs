use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use review_topics::config::{Config, PipelineParams};
use review_topics::db::{self, models::RunRecord, queries};
use review_topics::embedding::Metric;
use review_topics::error::PipelineError;
use review_topics::output::{scatter, terminal};
use review_topics::pipeline::{discover_files, run_batch};

/// Review topics: cluster product reviews into topics and contrast what
/// unhappy and happy customers say about each one.
#[derive(Parser)]
#[command(name = "review-topics", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Process every .tsv file in the data directory
    Run {
        /// Directory of review dumps (default: REVIEW_TOPICS_DATA_DIR)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Number of files processed in parallel (default: 1)
        #[arg(long, default_value = "1")]
        jobs: usize,

        /// Per-file wall-clock budget in seconds (default: REVIEW_TOPICS_FILE_TIMEOUT_SECS)
        #[arg(long)]
        timeout_secs: Option<u64>,

        #[command(flatten)]
        params: ParamArgs,
    },

    /// Show stored per-topic keyword summaries
    Report {
        /// Only show one product category (case-insensitive)
        #[arg(long)]
        category: Option<String>,
    },

    /// Show database stats and the last batch's outcomes
    Status,
}

/// Algorithm knobs for `run`.
#[derive(Args)]
struct ParamArgs {
    /// Most reviews kept per file after filtering
    #[arg(long, default_value = "100000")]
    sample_cap: usize,

    /// Seed for sampling, neighbor search and layout
    #[arg(long, default_value = "1729")]
    seed: u64,

    /// Minimum document frequency of a vectorizer term
    #[arg(long, default_value = "5")]
    min_df: usize,

    /// Maximum document frequency of a vectorizer term, as a fraction
    #[arg(long, default_value = "0.1")]
    max_df: f64,

    /// Disable the maximum document frequency cut
    #[arg(long, conflicts_with = "max_df")]
    no_max_df: bool,

    /// Neighbors per point in the projection graph
    #[arg(long, default_value = "30")]
    n_neighbors: usize,

    /// Minimum distance between embedded points
    #[arg(long, default_value = "0.0")]
    min_dist: f64,

    /// Distance between term rows: hellinger or cosine
    #[arg(long, default_value = "hellinger")]
    metric: Metric,

    /// Layout optimization epochs (default: chosen by sample size)
    #[arg(long)]
    epochs: Option<usize>,

    /// Neighbors defining a point's core distance
    #[arg(long, default_value = "10")]
    min_samples: usize,

    /// Smallest group of reviews that counts as a topic
    #[arg(long, default_value = "500")]
    min_cluster_size: usize,

    /// Minimum document frequency of a lexicon term
    #[arg(long, default_value = "5")]
    lexicon_min_df: usize,

    /// Keywords kept per lexicon summary
    #[arg(long, default_value = "30")]
    top_k: usize,

    /// Clustered reviews sampled per rating side
    #[arg(long, default_value = "5000")]
    samples_per_side: usize,

    /// Show progress bars
    #[arg(long)]
    progress: bool,
}

impl From<ParamArgs> for PipelineParams {
    fn from(args: ParamArgs) -> Self {
        Self {
            sample_cap: args.sample_cap,
            seed: args.seed,
            min_df: args.min_df,
            max_df: (!args.no_max_df).then_some(args.max_df),
            n_neighbors: args.n_neighbors,
            min_dist: args.min_dist,
            metric: args.metric,
            n_epochs: args.epochs,
            min_samples: args.min_samples,
            min_cluster_size: args.min_cluster_size,
            lexicon_min_df: args.lexicon_min_df,
            lexicon_top_k: args.top_k,
            samples_per_side: args.samples_per_side,
            progress: args.progress,
        }
    }
}

fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("review_topics=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            info!("Initializing review-topics database...");
            let config = Config::load()?;
            let conn = db::initialize(&config.db_path)?;
            let table_count = db::schema::table_count(&conn)?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!(
                "\nNext step: put review .tsv files in {} and run `review-topics run`",
                config.data_dir.display()
            );
        }

        Commands::Run {
            data_dir,
            jobs,
            timeout_secs,
            params,
        } => {
            let config = Config::load()?;
            let data_dir = data_dir.unwrap_or(config.data_dir.clone());
            let budget = timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(config.file_timeout);
            let params = PipelineParams::from(params);

            let files = discover_files(&data_dir)?;
            if files.is_empty() {
                println!("No .tsv files found in {}", data_dir.display());
                std::process::exit(1);
            }
            println!(
                "Processing {} files from {} ({} jobs)...",
                files.len(),
                data_dir.display(),
                jobs.max(1)
            );

            let mut conn = db::initialize(&config.db_path)?;
            let output_dir = config.output_dir.clone();
            let summary = run_batch(&files, &params, Some(budget), jobs, |report| {
                let source_file = report.source.display().to_string();
                queries::replace_file_artifacts(&mut conn, &source_file, &report.analysis)
                .map_err(|e| PipelineError::Persistence(format!("{e:#}")))?;

                // The stored rows are the artifact; the export is a convenience.
                match scatter::write_scatter(
                    &output_dir,
                    &report.dataset,
                    &report.source,
                    &report.analysis.documents,
                ) {
                    Ok(path) => info!(file = %source_file, export = %path.display(), "Scatter export written"),
                    Err(e) => warn!(file = %source_file, error = %e, "Scatter export failed"),
                }
                Ok(())
            })?;

            queries::clear_failed_files(&mut conn, &summary.outcomes)?;

            let combined = summary.combined();
            queries::write_combined(&mut conn, &combined)?;
            info!(rows = combined.len(), "Combined keywords written");

            let batch_id = queries::next_batch_id(&conn)?;
            for outcome in &summary.outcomes {
                queries::record_run(&conn, &RunRecord::from_outcome(batch_id, outcome))?;
            }

            terminal::display_batch_summary(&summary);

            if !summary.any_succeeded() {
                println!("\n{}", "No file completed successfully.".red().bold());
                std::process::exit(1);
            }
            println!(
                "\n{}",
                "Run `review-topics report` to see the topic summaries.".dimmed()
            );
        }

        Commands::Report { category } => {
            let config = Config::load()?;
            let conn = db::open(&config.db_path)?;
            let rows = queries::get_topic_keywords(&conn, category.as_deref())?;
            terminal::display_topic_report(&rows);
        }

        Commands::Status => {
            let config = Config::load()?;
            review_topics::status::show(&config.db_path)?;
        }
    }

    Ok(())
}
