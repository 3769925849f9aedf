//! End-to-end ingestion and question answering with local test doubles.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docqa_rag::{
    ChatModel, CompletionRequest, EmbeddingProvider, HashingEmbeddingProvider, IndexPolicy,
    IndexState, IngestionOrchestrator, PromptTemplate, RagConfig, RagError, Role, Source,
};

const HARBOR: &str = "The lighthouse keeper polished brass lanterns every evening near the \
                      harbor while fishing boats returned with their nets.";
const PHYSICS: &str = "Quantum chromodynamics describes gluons binding quarks inside protons \
                       and neutrons through the strong interaction.";

/// Records every request and replies with a fixed answer.
#[derive(Default)]
struct RecordingChat {
    requests: Mutex<Vec<CompletionRequest>>,
}

#[async_trait]
impl ChatModel for RecordingChat {
    fn name(&self) -> &str {
        "recording-chat"
    }

    async fn complete(&self, request: CompletionRequest) -> docqa_rag::Result<String> {
        self.requests.lock().unwrap().push(request);
        Ok("canned answer".to_string())
    }
}

struct BrokenChat;

#[async_trait]
impl ChatModel for BrokenChat {
    fn name(&self) -> &str {
        "broken-chat"
    }

    async fn complete(&self, _request: CompletionRequest) -> docqa_rag::Result<String> {
        Err(RagError::Pipeline("upstream returned 503".to_string()))
    }
}

/// Fails once it sees a text containing `poison`.
struct PoisonedEmbedder {
    inner: HashingEmbeddingProvider,
    poison: &'static str,
}

#[async_trait]
impl EmbeddingProvider for PoisonedEmbedder {
    async fn embed(&self, text: &str) -> docqa_rag::Result<Vec<f32>> {
        if text.contains(self.poison) {
            return Err(RagError::Embedding {
                provider: "poisoned".to_string(),
                message: "rate limited".to_string(),
            });
        }
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Ways an embedding provider can return malformed output.
#[derive(Clone, Copy)]
enum Misbehavior {
    DropsLastVector,
    WrongWidth,
    NotFinite,
}

struct MisbehavingEmbedder {
    inner: HashingEmbeddingProvider,
    misbehavior: Misbehavior,
}

#[async_trait]
impl EmbeddingProvider for MisbehavingEmbedder {
    async fn embed(&self, text: &str) -> docqa_rag::Result<Vec<f32>> {
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> docqa_rag::Result<Vec<Vec<f32>>> {
        let mut vectors = self.inner.embed_batch(texts).await?;
        match self.misbehavior {
            Misbehavior::DropsLastVector => {
                vectors.pop();
            }
            Misbehavior::WrongWidth => vectors.iter_mut().for_each(|v| v.push(0.0)),
            Misbehavior::NotFinite => vectors.iter_mut().for_each(|v| v[0] = f32::NAN),
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    harbor: PathBuf,
    physics: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let harbor = dir.path().join("harbor.txt");
        let physics = dir.path().join("physics.txt");
        std::fs::write(&harbor, HARBOR).unwrap();
        std::fs::write(&physics, PHYSICS).unwrap();
        Self { dir, harbor, physics }
    }

    fn location(&self) -> PathBuf {
        self.dir.path().join("faiss_index")
    }

    fn missing(&self) -> PathBuf {
        self.dir.path().join("missing.txt")
    }
}

fn embedder() -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashingEmbeddingProvider::new(512).unwrap())
}

fn orchestrator(config: RagConfig, location: &Path) -> IngestionOrchestrator {
    IngestionOrchestrator::builder()
        .config(config)
        .embedding_provider(embedder())
        .location(location)
        .build()
        .unwrap()
}

fn text(path: &Path) -> Source {
    Source::Text(path.to_path_buf())
}

#[tokio::test]
async fn verbatim_phrase_retrieves_its_own_chunk_first() {
    let fx = Fixture::new();
    let mut orchestrator = orchestrator(RagConfig::default(), &fx.location());

    orchestrator.build_or_load(&[text(&fx.harbor), text(&fx.physics)]).await.unwrap();
    let assistant =
        orchestrator.assistant(Arc::new(RecordingChat::default()), PromptTemplate::pdf_assistant()).unwrap();

    let context = assistant.retrieve("lighthouse keeper polished brass lanterns").await.unwrap();

    assert_eq!(context.len(), 2);
    assert!(context.passages()[0].chunk.text.contains("lighthouse keeper polished brass lanterns"));
    assert!(context.passages()[0].score > context.passages()[1].score);
}

#[tokio::test]
async fn rebuild_reflects_exactly_the_current_sources() {
    let fx = Fixture::new();
    let mut orchestrator = orchestrator(RagConfig::default(), &fx.location());

    orchestrator.build_or_load(&[text(&fx.harbor), text(&fx.physics)]).await.unwrap();
    let index = orchestrator.build_or_load(&[text(&fx.harbor)]).await.unwrap();

    assert_eq!(index.len(), 1);
    let physics_id = fx.physics.display().to_string();
    let query = embedder().embed(PHYSICS).await.unwrap();
    assert!(index.search(&query, 10).unwrap().iter().all(|r| r.chunk.document_id != physics_id));

    let reloaded = docqa_rag::FlatIndex::load(&fx.location()).await.unwrap();
    assert_eq!(reloaded.entries().len(), 1);
    assert!(!fx.dir.path().join("faiss_index.staging").exists());
}

#[tokio::test]
async fn extraction_failure_aborts_and_keeps_the_previous_index() {
    let fx = Fixture::new();
    let mut orchestrator = orchestrator(RagConfig::default(), &fx.location());
    orchestrator.build_or_load(&[text(&fx.harbor)]).await.unwrap();

    let err = orchestrator
        .build_or_load(&[text(&fx.physics), text(&fx.missing())])
        .await
        .unwrap_err();

    assert!(matches!(err, RagError::Extraction { .. }));
    assert!(matches!(orchestrator.state(), IndexState::NoIndex));
    assert!(matches!(orchestrator.index(), Err(RagError::IndexNotBuilt)));

    let on_disk = docqa_rag::FlatIndex::load(&fx.location()).await.unwrap();
    assert_eq!(on_disk.entries().len(), 1);
    assert_eq!(on_disk.entries()[0].chunk.document_id, fx.harbor.display().to_string());
}

#[tokio::test]
async fn extraction_failure_on_first_build_persists_nothing() {
    let fx = Fixture::new();
    let mut orchestrator = orchestrator(RagConfig::default(), &fx.location());

    let result = orchestrator.build_or_load(&[text(&fx.missing())]).await;

    assert!(result.is_err());
    assert!(!orchestrator.is_ready());
    assert!(!fx.location().exists());
}

#[tokio::test]
async fn embedding_failure_is_fail_fast_and_names_the_document() {
    let fx = Fixture::new();
    let mut orchestrator = IngestionOrchestrator::builder()
        .embedding_provider(Arc::new(PoisonedEmbedder {
            inner: HashingEmbeddingProvider::new(64).unwrap(),
            poison: "gluons",
        }))
        .location(fx.location())
        .build()
        .unwrap();

    let err = orchestrator.build_or_load(&[text(&fx.harbor), text(&fx.physics)]).await.unwrap_err();

    match &err {
        RagError::Embedding { message, .. } => {
            assert!(message.contains(&fx.physics.display().to_string()), "{message}");
            assert!(message.contains("rate limited"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!orchestrator.is_ready());
    assert!(!fx.location().exists());
}

#[tokio::test]
async fn skip_mode_ingests_the_readable_sources() {
    let fx = Fixture::new();
    let config = RagConfig::builder().skip_unreadable_sources(true).build().unwrap();
    let mut orchestrator = orchestrator(config, &fx.location());

    let index = orchestrator.build_or_load(&[text(&fx.missing()), text(&fx.harbor)]).await.unwrap();
    assert_eq!(index.len(), 1);

    let err = orchestrator.build_or_load(&[text(&fx.missing())]).await.unwrap_err();
    assert!(matches!(err, RagError::Pipeline(_)));
    assert!(!orchestrator.is_ready());
}

#[tokio::test]
async fn reuse_policy_loads_the_persisted_index() {
    let fx = Fixture::new();
    let config = RagConfig::builder().index_policy(IndexPolicy::ReuseExisting).build().unwrap();

    let mut first = orchestrator(config.clone(), &fx.location());
    first.build_or_load(&[text(&fx.harbor)]).await.unwrap();

    let mut second = orchestrator(config, &fx.location());
    let index = second.build_or_load(&[text(&fx.physics)]).await.unwrap();

    assert_eq!(index.len(), 1);
    let query = embedder().embed("lanterns").await.unwrap();
    let results = index.search(&query, 1).unwrap();
    assert_eq!(results[0].chunk.document_id, fx.harbor.display().to_string());
}

#[tokio::test]
async fn assistant_requires_a_ready_index() {
    let fx = Fixture::new();
    let orchestrator = orchestrator(RagConfig::default(), &fx.location());

    let result = orchestrator.assistant(Arc::new(BrokenChat), PromptTemplate::pdf_assistant());
    assert!(matches!(result, Err(RagError::IndexNotBuilt)));
}

#[tokio::test]
async fn prompt_carries_the_retrieved_context() {
    let fx = Fixture::new();
    let config = RagConfig::builder().top_k(1).max_tokens(123).temperature(0.3).build().unwrap();
    let mut orchestrator = orchestrator(config, &fx.location());
    orchestrator.build_or_load(&[text(&fx.harbor), text(&fx.physics)]).await.unwrap();

    let chat = Arc::new(RecordingChat::default());
    let assistant = orchestrator.assistant(chat.clone(), PromptTemplate::pdf_assistant()).unwrap();

    let answer = assistant.ask("What binds quarks inside protons?").await.unwrap();

    assert_eq!(answer.text, "canned answer");
    assert!(answer.generated);
    assert_eq!(answer.context.len(), 1);

    let requests = chat.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.max_tokens, 123);
    assert_eq!(request.temperature, Some(0.3));
    assert_eq!(request.messages[0].role, Role::System);
    assert!(request.messages[0].content.contains(PHYSICS));
    assert!(!request.messages[0].content.contains(HARBOR));
    assert_eq!(request.messages[1].role, Role::User);
    assert_eq!(request.messages[1].content, "What binds quarks inside protons?");
}

#[tokio::test]
async fn empty_context_returns_the_fixed_reply_without_calling_the_model() {
    let fx = Fixture::new();
    let config = RagConfig::builder()
        .similarity_threshold(0.99)
        .empty_context_reply("No relevant information found in the knowledge base.")
        .build()
        .unwrap();
    let mut orchestrator = orchestrator(config, &fx.location());
    orchestrator.build_or_load(&[text(&fx.harbor)]).await.unwrap();

    let chat = Arc::new(RecordingChat::default());
    let assistant = orchestrator.assistant(chat.clone(), PromptTemplate::records_assistant()).unwrap();

    let answer = assistant.ask("zebra").await.unwrap();

    assert!(!answer.generated);
    assert!(answer.context.is_empty());
    assert_eq!(answer.text, "No relevant information found in the knowledge base.");
    assert!(chat.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn generation_failure_keeps_its_cause() {
    let fx = Fixture::new();
    let mut orchestrator = orchestrator(RagConfig::default(), &fx.location());
    orchestrator.build_or_load(&[text(&fx.harbor)]).await.unwrap();
    let assistant = orchestrator.assistant(Arc::new(BrokenChat), PromptTemplate::pdf_assistant()).unwrap();

    let err = assistant.ask("lanterns").await.unwrap_err();

    match &err {
        RagError::Generation { model, .. } => assert_eq!(model, "broken-chat"),
        other => panic!("unexpected error: {other:?}"),
    }
    let cause = std::error::Error::source(&err).expect("cause attached");
    assert!(cause.to_string().contains("upstream returned 503"));

    // The assistant stays usable after a failed query.
    assert_eq!(assistant.retrieve("lanterns").await.unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_embedder_output_aborts_the_rebuild() {
    for (misbehavior, needle) in [
        (Misbehavior::DropsLastVector, "expected 1 vectors, got 0"),
        (Misbehavior::WrongWidth, "expected 64 dimensions, got 65"),
        (Misbehavior::NotFinite, "non-finite"),
    ] {
        let fx = Fixture::new();
        let mut orchestrator = IngestionOrchestrator::builder()
            .embedding_provider(Arc::new(MisbehavingEmbedder {
                inner: HashingEmbeddingProvider::new(64).unwrap(),
                misbehavior,
            }))
            .location(fx.location())
            .build()
            .unwrap();

        let Err(err) = orchestrator.build_or_load(&[text(&fx.harbor)]).await else {
            panic!("rebuild should fail for {needle}");
        };

        match &err {
            RagError::Embedding { message, .. } => {
                assert!(message.contains(&fx.harbor.display().to_string()), "{message}");
                assert!(message.contains(needle), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!orchestrator.is_ready());
        assert!(!fx.location().exists());
        assert!(!fx.dir.path().join("faiss_index.staging").exists());
    }
}

#[tokio::test]
async fn reusing_an_index_of_another_width_fails() {
    let fx = Fixture::new();
    let config = RagConfig::builder().index_policy(IndexPolicy::ReuseExisting).build().unwrap();
    orchestrator(config.clone(), &fx.location()).build_or_load(&[text(&fx.harbor)]).await.unwrap();

    let mut narrower = IngestionOrchestrator::builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbeddingProvider::new(32).unwrap()))
        .location(fx.location())
        .build()
        .unwrap();

    let Err(err) = narrower.build_or_load(&[text(&fx.harbor)]).await else {
        panic!("a 512-wide index must not be reused by a 32-wide embedder");
    };

    assert!(matches!(err, RagError::DimensionMismatch { expected: 512, actual: 32 }));
    assert!(!narrower.is_ready());
    assert!(fx.location().join("index.json").exists());
}
