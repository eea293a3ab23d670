//! CLI binary for threadlens.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use threadlens::{AnswerEngine, AppConfig, ChatCompletionsModel, PromptBuilder};
use threadlens_search::{SearchMode, SearchOrchestrator, SearchResult};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Threadlens: answer questions from forum discussions, with citations.
#[derive(Parser)]
#[command(name = "threadlens", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Search mode: auto, posts, comments or communities.
    #[arg(short, long, default_value = "auto")]
    mode: SearchMode,

    /// Maximum number of ranked results.
    #[arg(short, long, default_value_t = 10)]
    limit: usize,

    /// Print ranked results without calling the language model.
    #[arg(long)]
    search_only: bool,

    /// The question.
    #[arg(required = true, num_args = 1..)]
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    // Logs go to stderr so stdout carries only the answer.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    let query = cli.query.join(" ");
    let search = Arc::new(SearchOrchestrator::new(config.search.clone())?);
    let janitor = search.start_cache_janitor();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let outcome = if cli.search_only {
        run_search(&search, &query, cli.mode, cli.limit, &cancel).await
    } else {
        run_answer(search, &config, &query, cli.mode, cli.limit, &cancel).await
    };

    if let Some(janitor) = janitor {
        janitor.stop().await;
    }
    outcome
}

async fn run_search(
    search: &SearchOrchestrator,
    query: &str,
    mode: SearchMode,
    limit: usize,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let results = search.search(query, mode, limit, cancel).await?;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (index, result) in results.iter().enumerate() {
        print_result(index + 1, result);
    }
    Ok(())
}

async fn run_answer(
    search: Arc<SearchOrchestrator>,
    config: &AppConfig,
    query: &str,
    mode: SearchMode,
    limit: usize,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let model = Arc::new(ChatCompletionsModel::new(config.llm.clone())?);
    let prompt = PromptBuilder::new(
        config.llm.max_results_in_prompt,
        config.llm.max_excerpt_chars,
    );
    let engine = AnswerEngine::new(search, model, prompt);

    let answer = engine.answer(query, mode, limit, cancel).await?;
    info!(results = answer.results.len(), "done");

    let extracted = &answer.extracted;
    if !extracted.steps.is_empty() {
        println!("Reasoning:");
        for (index, step) in extracted.steps.iter().enumerate() {
            println!("  {}. {}", index + 1, step.title);
        }
        println!();
    }
    println!("{}", extracted.answer);
    let sources = extracted.render_sources();
    if !sources.is_empty() {
        println!();
        print!("{sources}");
    }
    Ok(())
}

fn print_result(position: usize, result: &SearchResult) {
    let title = if result.title.is_empty() {
        result.kind.name()
    } else {
        result.title.as_str()
    };
    println!("{position:>2}. [{}] {title}", result.kind);
    println!(
        "    r/{} · u/{} · {} points · {} replies · {}",
        result.community,
        result.author,
        result.score,
        result.reply_count,
        result.created_at.format("%Y-%m-%d")
    );
    println!("    {}", result.url);
    for highlight in &result.highlights {
        println!("    > {highlight}");
    }
}
