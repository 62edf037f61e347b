//! # Policy Chat CLI (`pchat`)
//!
//! The `pchat` binary wraps the library with commands for database
//! initialization, document ingestion, one-shot questions, an interactive
//! chat session, and topic inspection.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pchat init` | Create the SQLite database and run schema migrations |
//! | `pchat ingest <file>` | Chunk, embed, and index a policy document |
//! | `pchat ask "<query>"` | Answer a single question |
//! | `pchat chat` | Interactive conversation (`quit`, `reset`, `summary`) |
//! | `pchat topics` | List recognized topics and their keyword sets |

use std::io::{BufRead, Write as _};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use policy_chat::config::{self, Config};
use policy_chat::embedding::create_gateway;
use policy_chat::index::SqliteIndex;
use policy_chat::models::Answer;
use policy_chat::session::Engine;
use policy_chat::topic::{Topic, TopicLexicon};
use policy_chat::{db, ingest, migrate};

/// Policy Chat — conversational question answering over a financial policy
/// document.
#[derive(Parser)]
#[command(
    name = "pchat",
    about = "Conversational question answering over a financial policy document",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./pchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the chunk, vector, and metadata
    /// tables. Idempotent.
    Init,

    /// Ingest a policy document.
    ///
    /// Reads the file, chunks it, embeds every chunk with the configured
    /// provider, and atomically replaces the vector index contents.
    Ingest {
        /// Path to the document (plain text).
        file: PathBuf,
    },

    /// Answer a single question and exit.
    Ask {
        /// The question to answer.
        query: String,

        /// Session id, letting consecutive invocations share context.
        #[arg(long, default_value = "default")]
        session: String,

        /// Print the answer as JSON instead of formatted text.
        #[arg(long)]
        json: bool,
    },

    /// Start an interactive conversation.
    ///
    /// Type `quit` to exit, `reset` to clear the conversation, and
    /// `summary` for a one-line session overview.
    Chat,

    /// List recognized topics and their keyword sets.
    Topics,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // `topics` with no config file still works on defaults.
    if matches!(&cli.command, Commands::Topics) {
        let cfg = config::load_config(&cli.config)
            .map(|c| c.topics)
            .unwrap_or_default();
        print_topics(&TopicLexicon::new(&cfg));
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized at {}.", cfg.db.path.display());
        }
        Commands::Ingest { file } => {
            let document = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read document: {}", file.display()))?;
            let gateway = create_gateway(&cfg.embedding)?;
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            let index = SqliteIndex::new(pool);
            let stats = ingest::ingest_document(&cfg, gateway.as_ref(), &index, &document).await?;
            println!(
                "Ingested {} chunks ({} dims, model {}).",
                stats.chunks,
                stats.dims,
                gateway.model_name()
            );
        }
        Commands::Ask {
            query,
            session,
            json,
        } => {
            let engine = build_engine(&cfg).await?;
            let answer = engine.submit_query(&session, &query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                print_answer(&answer);
            }
        }
        Commands::Chat => {
            let engine = build_engine(&cfg).await?;
            run_chat(&engine).await?;
        }
        Commands::Topics => unreachable!("handled above"),
    }

    Ok(())
}

async fn build_engine(cfg: &Config) -> anyhow::Result<Engine> {
    let gateway = create_gateway(&cfg.embedding)?;
    let pool = db::connect(&cfg.db.path).await?;
    migrate::run_migrations(&pool).await?;
    let index = Arc::new(SqliteIndex::new(pool));
    Ok(Engine::new(cfg, Arc::from(gateway), index))
}

async fn run_chat(engine: &Engine) -> anyhow::Result<()> {
    let session = uuid::Uuid::new_v4().to_string();
    let session = session.as_str();
    println!("Policy Chat. Ask about the policy document (quit, reset, summary).");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        match input {
            "" => continue,
            "quit" | "exit" => break,
            "reset" => {
                engine.reset_session(session).await;
                println!("Conversation cleared.");
            }
            "summary" => println!("{}", engine.session_summary(session).await),
            query => match engine.submit_query(session, query).await {
                Ok(answer) => print_answer(&answer),
                Err(e) => eprintln!("Error: {e}"),
            },
        }
    }
    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("[{}] {}", answer.topic, answer.summary);
    for section in &answer.sections {
        println!("\n{}:", section.label);
        for line in &section.lines {
            println!("  - {line}");
        }
    }
    if !answer.citations.is_empty() {
        println!("\nSources: {}", answer.citations.join(", "));
    }
}

fn print_topics(lexicon: &TopicLexicon) {
    for topic in Topic::ALL {
        let keywords = lexicon.keywords(topic);
        if keywords.is_empty() {
            println!("{topic}: (fallback, no keywords)");
        } else {
            println!("{topic}: {}", keywords.join(", "));
        }
    }
}
