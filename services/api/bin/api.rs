//! Main Entrypoint for the Evocode API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the database connection pool and running migrations.
//! 3. Loading and validating the topic graph.
//! 4. Constructing the external-service clients and tutoring services.
//! 5. Constructing the Axum router and applying middleware.
//! 6. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use evocode_api::{config::Config, db::Db, router::create_router, state::AppState};
use evocode_core::{
    documents::DocumentIngestor,
    generator::ContentGenerator,
    grader::QuizGrader,
    graph::TopicGraph,
    judge::Judge0Client,
    llm::OpenAiChatClient,
    prompts::Prompts,
    retrieval::{HttpEmbedder, HttpVectorStore, Retriever},
    tutor::Tutor,
};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Sampling temperature for lesson and quiz generation.
const GENERATION_TEMPERATURE: f32 = 0.7;
/// Sampling temperature for grading validation, kept low for consistency.
const VALIDATION_TEMPERATURE: f32 = 0.1;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Database ---
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let db = Arc::new(Db::new(pool));
    db.run_migrations().await?;
    info!("Database connection established and migrations are up-to-date.");

    // --- 4. Load the Topic Graph ---
    // An invalid graph (unknown prerequisite ids, duplicate topics) is a
    // configuration error: refuse to start rather than silently block
    // learner progression later.
    let graph = Arc::new(
        TopicGraph::load(&config.graph_path).with_context(|| {
            format!("Failed to load topic graph from {}", config.graph_path.display())
        })?,
    );
    info!(topics = graph.len(), "Topic graph loaded and validated.");

    // --- 5. Initialize Shared Services ---
    let prompts = Arc::new(if config.prompts_path.is_dir() {
        Prompts::load_dir(&config.prompts_path)?
    } else {
        info!("No prompts directory found; using built-in templates.");
        Prompts::builtin()
    });

    let llm_config = OpenAIConfig::new()
        .with_api_key(config.groq_api_key.clone())
        .with_api_base(config.llm_api_base.clone());
    let generation_chat = Arc::new(OpenAiChatClient::new(
        llm_config.clone(),
        config.chat_model.clone(),
        GENERATION_TEMPERATURE,
    ));
    let validation_chat = Arc::new(OpenAiChatClient::new(
        llm_config,
        config.chat_model.clone(),
        VALIDATION_TEMPERATURE,
    ));

    let embedder = Arc::new(HttpEmbedder::new(
        config.embedding_api_base.clone(),
        config.embedding_api_key.clone(),
        config.embedding_model.clone(),
        config.embedding_dimension,
    ));
    let vector_store = Arc::new(HttpVectorStore::new(config.vector_store_url.clone()));

    let retriever = Retriever::new(
        embedder.clone(),
        vector_store.clone(),
        config.lesson_collection.clone(),
    );
    let generator = ContentGenerator::new(generation_chat, retriever, prompts.clone());
    let tutor = Arc::new(Tutor::new(graph.clone(), generator));

    let executor = Arc::new(Judge0Client::new(
        config.judge0_base_url.clone(),
        config.judge0_api_key.clone(),
        config.judge0_api_host.clone(),
    ));
    let grader = Arc::new(QuizGrader::new(executor, validation_chat, prompts));
    let ingestor = Arc::new(DocumentIngestor::new(embedder, vector_store));

    let app_state = Arc::new(AppState {
        db,
        graph,
        tutor,
        grader,
        ingestor,
        config: Arc::new(config.clone()),
    });

    // --- 6. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 7. Start Server ---
    info!(
        model = %config.chat_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
