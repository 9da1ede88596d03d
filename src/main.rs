use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use automark::{
    Gradebook, GradebookRow, GeminiClient, GeminiConfig, InvokerConfig, KeyResolver, KeySource,
    MarkError, MediaKind, OutputMode, Page, PipelineConfig, RubricConfig, ScoreStatus, Submission,
    grade_submission,
};

#[derive(Parser)]
#[command(name = "automark")]
#[command(author, version, about = "Automated worksheet marking pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade one student's worksheet pages against the answer key
    Mark {
        /// Student identifier (non-empty)
        #[arg(short, long)]
        student: String,

        /// Worksheet page files, in order (jpg/jpeg/png/pdf)
        #[arg(short, long = "page", required = true)]
        pages: Vec<PathBuf>,

        /// Answer key: a local file or an http(s) URL
        #[arg(short = 'k', long)]
        answer_key: String,

        /// Model identifier from the supported list
        #[arg(short, long, default_value = "gemini-2.5-flash")]
        model: String,

        /// Number of independent grading passes to average
        #[arg(long, default_value = "1")]
        passes: u32,

        /// Parse free-text replies instead of requiring structured JSON
        #[arg(long)]
        lenient: bool,

        /// Gradebook file
        #[arg(long, default_value = "gradebook.json")]
        store: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the gradebook table
    Gradebook {
        /// Gradebook file
        #[arg(long, default_value = "gradebook.json")]
        store: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Mark {
            student,
            pages,
            answer_key,
            model,
            passes,
            lenient,
            store,
            verbose,
        } => {
            setup_logging(verbose);
            mark(
                student, pages, answer_key, model, passes, lenient, store,
            )
            .await
        }
        Commands::Gradebook { store, verbose } => {
            setup_logging(verbose);
            show_gradebook(store)
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

async fn mark(
    student: String,
    page_paths: Vec<PathBuf>,
    answer_key: String,
    model: String,
    passes: u32,
    lenient: bool,
    store: PathBuf,
) -> Result<()> {
    let pages = load_pages(&page_paths)?;
    let submission = Submission::new(&student, pages)?;

    let config = PipelineConfig {
        rubric: RubricConfig {
            mode: if lenient {
                OutputMode::Lenient
            } else {
                OutputMode::Strict
            },
        },
        invoker: InvokerConfig {
            passes,
            ..Default::default()
        },
    };

    let client = GeminiClient::new(GeminiConfig::from_env(&model)?);
    info!("Using model {} with {} pass(es)", client.model(), passes.max(1));
    let resolver = KeyResolver::new(KeySource::parse(&answer_key));

    let result = grade_submission(&client, &resolver, &submission, &config).await?;

    println!("Student: {}", submission.student);
    println!("Mark: {}", result.mark());
    if let ScoreStatus::Invalid(reason) = &result.status {
        println!("NOTE: score failed validation ({}), review manually", reason);
    }
    println!();
    println!("{}", result.feedback);

    // The result above is already shown; a store failure only loses the
    // record, so it is downgraded to a warning.
    let row = GradebookRow {
        student: submission.student.clone(),
        date: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        mark: result.mark(),
    };
    if let Err(e) = Gradebook::new(&store).append(row) {
        warn!("Result was NOT recorded in the gradebook: {}", e);
    }

    Ok(())
}

fn show_gradebook(store: PathBuf) -> Result<()> {
    let rows = Gradebook::new(&store)
        .read()
        .with_context(|| format!("Failed to read gradebook {:?}", store))?;

    if rows.is_empty() {
        println!("Gradebook is empty");
        return Ok(());
    }

    println!("{:<24} {:<20} {}", "Student", "Date", "Mark");
    println!("{:-<24} {:-<20} {:-<8}", "", "", "");
    for row in &rows {
        println!("{:<24} {:<20} {}", row.student, row.date, row.mark);
    }
    println!();
    println!("{} result(s)", rows.len());

    Ok(())
}

fn load_pages(paths: &[PathBuf]) -> Result<Vec<Page>> {
    let mut pages = Vec::with_capacity(paths.len());

    for (ordinal, path) in paths.iter().enumerate() {
        let kind = media_kind(path).ok_or_else(|| MarkError::Input {
            ordinal,
            reason: format!("unsupported file type: {:?} (use jpg/jpeg/png/pdf)", path),
        })?;
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
        pages.push(Page {
            bytes,
            kind,
            ordinal,
        });
    }

    Ok(pages)
}

/// Declared media category from the file extension.
fn media_kind(path: &Path) -> Option<MediaKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" | "png" => Some(MediaKind::Raster),
        "pdf" => Some(MediaKind::Document),
        _ => None,
    }
}
