//! Command handlers wiring settings, providers, and the pipeline together.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use docqa_rag::{
    ChatModel, EmbeddingProvider, HuggingFaceChatModel, HuggingFaceEmbeddingProvider,
    IndexPolicy, IngestionOrchestrator, PromptTemplate, RagAssistant, RagConfig,
    RecursiveChunker, Settings, Source,
};
use tracing::info;

use crate::cli::{Cli, Commands, QueryArgs};
use crate::console;

/// Default index directory of the records mode.
pub const RECORDS_INDEX_DIR: &str = "records_index";

/// Run the parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env()?;
    info!(?settings, "loaded settings");

    match cli.command {
        Commands::Pdf { files, query } => {
            let location = cli.index_dir.unwrap_or_else(|| settings.index_dir.clone());
            run_pdf(&settings, files, location, query).await
        }
        Commands::Records { json, from_mongo, key, export_path, rebuild, query } => {
            let location = cli.index_dir.unwrap_or_else(|| PathBuf::from(RECORDS_INDEX_DIR));
            let path = match json {
                Some(path) => path,
                None if from_mongo => export(&settings, &export_path).await?,
                None => anyhow::bail!("either --json or --from-mongo is required"),
            };
            run_records(&settings, path, key, location, rebuild, query).await
        }
        Commands::ExportMongo { out } => {
            let written = export(&settings, &out).await?;
            println!("Exported to {}", written.display());
            Ok(())
        }
    }
}

async fn run_pdf(
    settings: &Settings,
    files: Vec<PathBuf>,
    location: PathBuf,
    query: QueryArgs,
) -> Result<()> {
    let sources = files.into_iter().map(Source::from_path).collect::<Result<Vec<_>, _>>()?;

    let mut config = RagConfig::pdf().to_builder();
    if let Some(k) = query.top_k {
        config = config.top_k(k);
    }
    let config = config.build()?;
    let chunker = RecursiveChunker::markdown(config.chunk_size, config.chunk_overlap)?;

    let assistant = prepare(
        settings,
        config,
        Arc::new(chunker),
        &location,
        &sources,
        PromptTemplate::pdf_assistant(),
    )
    .await?;
    answer(&assistant, query.question.as_deref()).await
}

async fn run_records(
    settings: &Settings,
    path: PathBuf,
    key: String,
    location: PathBuf,
    rebuild: bool,
    query: QueryArgs,
) -> Result<()> {
    let sources = vec![Source::json_records(path, key)];

    let mut config = RagConfig::records().to_builder();
    if let Some(k) = query.top_k {
        config = config.top_k(k);
    }
    if rebuild {
        config = config.index_policy(IndexPolicy::AlwaysRebuild);
    }
    let config = config.build()?;
    let chunker = RecursiveChunker::json_records(config.chunk_size, config.chunk_overlap)?;

    let assistant = prepare(
        settings,
        config,
        Arc::new(chunker),
        &location,
        &sources,
        PromptTemplate::records_assistant(),
    )
    .await?;
    answer(&assistant, query.question.as_deref()).await
}

async fn prepare(
    settings: &Settings,
    config: RagConfig,
    chunker: Arc<RecursiveChunker>,
    location: &Path,
    sources: &[Source],
    prompt: PromptTemplate,
) -> Result<RagAssistant> {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(
        HuggingFaceEmbeddingProvider::new(&settings.hf_token)?
            .with_model(&settings.embedding_model, settings.embedding_dimensions),
    );
    let model: Arc<dyn ChatModel> =
        Arc::new(HuggingFaceChatModel::new(&settings.hf_token)?.with_model(&settings.chat_model));

    let mut orchestrator = IngestionOrchestrator::builder()
        .config(config)
        .chunker(chunker)
        .embedding_provider(embedder)
        .location(location)
        .build()?;

    println!("Preparing index at {} ...", location.display());
    let index = orchestrator
        .build_or_load(sources)
        .await
        .with_context(|| format!("failed to prepare index at {}", location.display()))?;
    println!("Index ready with {} chunks.", index.len());

    Ok(orchestrator.assistant(model, prompt)?)
}

async fn answer(assistant: &RagAssistant, question: Option<&str>) -> Result<()> {
    match question {
        Some(question) => console::ask_once(assistant, question).await,
        None => console::run_console(assistant).await,
    }
}

#[cfg(feature = "mongodb")]
async fn export(settings: &Settings, out: &Path) -> Result<PathBuf> {
    use docqa_rag::mongo::{DEFAULT_COLLECTIONS, DEFAULT_DATABASE, export_collections};

    let uri = settings.require_mongo_uri()?;
    Ok(export_collections(uri, DEFAULT_DATABASE, DEFAULT_COLLECTIONS, out).await?)
}

#[cfg(not(feature = "mongodb"))]
async fn export(_settings: &Settings, _out: &Path) -> Result<PathBuf> {
    anyhow::bail!("this build of docqa has no MongoDB support; rebuild with the `mongodb` feature")
}
