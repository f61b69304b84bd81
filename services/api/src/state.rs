//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the database pool, the topic graph, and the
//! tutoring services. Everything is constructed once at startup and
//! injected into handlers; no service is lazily initialized behind a
//! global.

use crate::config::Config;
use evocode_core::documents::DocumentIngestor;
use evocode_core::grader::QuizGrader;
use evocode_core::graph::TopicGraph;
use evocode_core::tutor::Tutor;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<crate::db::Db>,
    pub graph: Arc<TopicGraph>,
    pub tutor: Arc<Tutor>,
    pub grader: Arc<QuizGrader>,
    pub ingestor: Arc<DocumentIngestor>,
    pub config: Arc<Config>,
}
