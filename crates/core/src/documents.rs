//! Personal document ingestion.
//!
//! Uploaded study material is chunked, embedded, and stored in the
//! learner's personal vector collection, where lesson retrieval picks it up
//! alongside the shared corpus.

use std::sync::Arc;

use tracing::info;

use crate::error::{CoreError, Result};
use crate::retrieval::{Embedder, Retriever, VectorStore, split_text};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md"];

const CHUNK_SIZE: usize = 1000;
const CHUNK_OVERLAP: usize = 100;

pub struct DocumentIngestor {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl DocumentIngestor {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Stores a document in the learner's personal collection and returns
    /// the number of chunks written.
    ///
    /// Only plain-text uploads (`.txt`, `.md`) are accepted; anything else
    /// is a validation failure, as is a document with no extractable text.
    pub async fn ingest(&self, user_id: &str, filename: &str, content: &str) -> Result<usize> {
        let extension = filename
            .rsplit('.')
            .next()
            .filter(|ext| *ext != filename)
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(CoreError::Validation(format!(
                "unsupported document type '{filename}': expected one of .txt, .md"
            )));
        }
        if content.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "document '{filename}' contains no text"
            )));
        }

        let chunks = split_text(content, CHUNK_SIZE, CHUNK_OVERLAP);
        let vectors = self.embedder.embed(chunks.clone()).await?;

        let collection = Retriever::personal_collection(user_id);
        self.store
            .ensure_collection(collection.clone(), self.embedder.dimension())
            .await?;
        let stored = chunks.len();
        self.store.upsert(collection, chunks, vectors).await?;

        info!(user_id, filename, chunks = stored, "document ingested");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::{MockEmbedder, MockVectorStore};

    #[tokio::test]
    async fn rejects_unsupported_extension_before_any_upstream_call() {
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().times(0);
        let mut store = MockVectorStore::new();
        store.expect_upsert().times(0);

        let err = DocumentIngestor::new(Arc::new(embedder), Arc::new(store))
            .ingest("alex", "notes.exe", "content")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_extensionless_and_empty_documents() {
        let embedder = MockEmbedder::new();
        let store = MockVectorStore::new();
        let ingestor = DocumentIngestor::new(Arc::new(embedder), Arc::new(store));

        assert!(ingestor.ingest("alex", "README", "text").await.is_err());
        assert!(ingestor.ingest("alex", "notes.txt", "  \n ").await.is_err());
    }

    #[tokio::test]
    async fn stores_chunks_in_the_personal_collection() {
        let mut embedder = MockEmbedder::new();
        embedder
            .expect_embed()
            .times(1)
            .returning(|chunks| Ok(vec![vec![0.1]; chunks.len()]));
        embedder.expect_dimension().return_const(1536usize);

        let mut store = MockVectorStore::new();
        store
            .expect_ensure_collection()
            .withf(|collection, dimension| collection == "user-alex" && *dimension == 1536)
            .times(1)
            .returning(|_, _| Ok(()));
        store
            .expect_upsert()
            .withf(|collection, chunks, vectors| {
                collection == "user-alex" && !chunks.is_empty() && chunks.len() == vectors.len()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let stored = DocumentIngestor::new(Arc::new(embedder), Arc::new(store))
            .ingest("alex", "Notes.MD", "lists hold ordered items")
            .await
            .unwrap();
        assert_eq!(stored, 1);
    }
}
