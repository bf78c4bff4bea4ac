use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use docqa_core::gemini::{
    DEFAULT_API_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL, DEFAULT_TEMPERATURE,
};
use docqa_core::{
    add_files, GeminiClient, GeminiConfig, Pipeline, PipelineOptions, DEFAULT_TOP_K,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docqa", version, about = "Ask questions about the documents in a folder")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Folder scanned for documents (top level only)
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Folder holding the per-type indexes and their sidecars
    #[arg(long, global = true, default_value = "indexes")]
    index_dir: PathBuf,

    /// Chunks retrieved from each file type
    #[arg(long, global = true, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Gemini API key
    #[arg(long, global = true, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Generative Language API base URL
    #[arg(long, global = true, env = "GEMINI_API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    api_base_url: String,

    #[arg(long, global = true, default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    #[arg(long, global = true, default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    #[arg(long, global = true, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// HTTP request timeout in seconds
    #[arg(long, global = true, default_value_t = 60)]
    timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Index the data folder and answer a question (prompted when omitted).
    Ask {
        question: Option<String>,
    },
    /// Build or refresh the indexes without asking anything.
    Index,
    /// Copy files into the data folder.
    Add {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

impl Cli {
    fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            data_dir: self.data_dir.clone(),
            index_dir: self.index_dir.clone(),
            top_k: self.top_k,
            ..PipelineOptions::default()
        }
    }

    fn gemini_client(&self) -> anyhow::Result<GeminiClient> {
        let api_key = self
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .context("GOOGLE_API_KEY is not set; export it, add it to .env or pass --api-key")?;

        let config = GeminiConfig {
            api_key,
            base_url: self.api_base_url.clone(),
            embedding_model: self.embedding_model.clone(),
            chat_model: self.chat_model.clone(),
            temperature: self.temperature,
            timeout: Duration::from_secs(self.timeout_secs),
        };

        Ok(GeminiClient::new(config)?)
    }
}

fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "docqa boot"
    );

    match &cli.command {
        None => ask(&cli, None),
        Some(Command::Ask { question }) => ask(&cli, question.clone()),
        Some(Command::Index) => index(&cli),
        Some(Command::Add { files }) => {
            for added in add_files(&cli.data_dir, files.as_slice())? {
                let status = if added.copied { "added" } else { "unchanged" };
                println!("{status}: {}", added.destination.display());
            }
            Ok(())
        }
    }
}

fn ask(cli: &Cli, question: Option<String>) -> anyhow::Result<()> {
    let question = match question {
        Some(question) => question,
        None => prompt_question()?,
    };

    let client = cli.gemini_client()?;
    let pipeline = Pipeline::new(cli.pipeline_options(), &client, &client);

    match pipeline.ask(&question)? {
        Some(answer) => println!("{}", answer.text),
        None => println!(
            "No supported files found in '{}' folder.",
            cli.data_dir.display()
        ),
    }

    Ok(())
}

fn index(cli: &Cli) -> anyhow::Result<()> {
    let client = cli.gemini_client()?;
    let pipeline = Pipeline::new(cli.pipeline_options(), &client, &client);

    let stores = pipeline.index_all()?;
    if stores.is_empty() {
        println!("No files found in '{}' folder.", cli.data_dir.display());
    }

    for (file_type, store) in &stores {
        let label: &str = if file_type.is_empty() { "(none)" } else { file_type };
        match store {
            Some(store) => println!("{label}: {} chunks", store.len()),
            None => println!("{label}: not indexed"),
        }
    }

    Ok(())
}

fn prompt_question() -> anyhow::Result<String> {
    print!("Ask your question: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read question from stdin")?;

    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
