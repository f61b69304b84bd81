//! Retrieval-augmented context for lesson generation.
//!
//! Documents are chunked, embedded through an OpenAI-compatible embeddings
//! endpoint, and stored in a vector database reachable over its REST API.
//! Lesson generation embeds the topic title and pulls the closest chunks
//! from the shared lesson corpus plus the learner's personal collection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CoreError, Result};

/// How many context chunks a lesson retrieves per collection.
pub const RETRIEVAL_TOP_K: usize = 3;

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Splits text into chunks of at most `chunk_size` characters, preferring
/// paragraph, line, sentence, and finally word boundaries, with `overlap`
/// characters carried between consecutive chunks.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for piece in split_pieces(text, &["\n\n", "\n", ". ", " "], chunk_size) {
        if !current.is_empty() && current.chars().count() + piece.chars().count() > chunk_size {
            let tail: String = current
                .chars()
                .skip(current.chars().count().saturating_sub(overlap))
                .collect();
            chunks.push(std::mem::take(&mut current));
            current = tail;
        }
        if !current.is_empty() && !current.ends_with(char::is_whitespace) {
            current.push(' ');
        }
        current.push_str(&piece);
    }
    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Breaks `text` on the first separator that yields pieces small enough,
/// recursing into finer separators for oversized pieces.
fn split_pieces(text: &str, separators: &[&str], chunk_size: usize) -> Vec<String> {
    let Some((sep, rest)) = separators.split_first() else {
        // No separators left: hard-split by character count.
        return text
            .chars()
            .collect::<Vec<_>>()
            .chunks(chunk_size.max(1))
            .map(|c| c.iter().collect())
            .collect();
    };

    let mut pieces = Vec::new();
    for part in text.split(sep) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if part.chars().count() > chunk_size {
            pieces.extend(split_pieces(part, rest, chunk_size));
        } else {
            pieces.push(part.to_string());
        }
    }
    pieces
}

/// Turns text into embedding vectors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Dimensionality of the vectors this embedder produces.
    fn dimension(&self) -> usize;
}

/// `Embedder` backed by an OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(api_base: String, api_key: Option<String>, model: String, dimension: usize) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model,
            dimension,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.api_base);
        let mut request = self.http.post(&url).json(&EmbeddingRequest {
            model: &self.model,
            input: &inputs,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::Upstream(format!(
                "embeddings endpoint returned {status}: {body}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Upstream(format!("malformed embeddings response: {e}")))?;
        if parsed.data.len() != inputs.len() {
            return Err(CoreError::Upstream(format!(
                "embeddings count mismatch: sent {}, got {}",
                inputs.len(),
                parsed.data.len()
            )));
        }
        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// A vector database holding named collections of text chunks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates the collection if it does not already exist.
    async fn ensure_collection(&self, collection: String, dimension: usize) -> Result<()>;

    /// Stores chunks with their vectors in a collection.
    async fn upsert(
        &self,
        collection: String,
        chunks: Vec<String>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<()>;

    /// Returns the text of the `limit` closest chunks. A missing collection
    /// yields an empty result, not an error.
    async fn search(
        &self,
        collection: String,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<String>>;
}

/// `VectorStore` speaking a Qdrant-style REST API.
pub struct HttpVectorStore {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct CreateCollectionRequest {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Serialize)]
struct UpsertRequest {
    points: Vec<Point>,
}

#[derive(Serialize)]
struct Point {
    id: String,
    vector: Vec<f32>,
    payload: PointPayload,
}

#[derive(Serialize, Deserialize)]
struct PointPayload {
    text: String,
}

#[derive(Serialize)]
struct SearchRequest {
    vector: Vec<f32>,
    limit: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    payload: Option<PointPayload>,
}

impl HttpVectorStore {
    pub fn new(base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn ensure_collection(&self, collection: String, dimension: usize) -> Result<()> {
        let url = format!("{}/collections/{collection}", self.base_url);
        let response = self
            .http
            .put(&url)
            .json(&CreateCollectionRequest {
                vectors: VectorParams {
                    size: dimension,
                    distance: "Cosine",
                },
            })
            .send()
            .await?;

        // An already-existing collection is fine.
        if response.status().is_success() || response.status() == reqwest::StatusCode::CONFLICT {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(CoreError::Upstream(format!(
                "vector store create '{collection}' returned {status}: {body}"
            )))
        }
    }

    async fn upsert(
        &self,
        collection: String,
        chunks: Vec<String>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(CoreError::Validation(format!(
                "chunk/vector count mismatch: {} vs {}",
                chunks.len(),
                vectors.len()
            )));
        }
        let points: Vec<Point> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(text, vector)| Point {
                id: uuid::Uuid::new_v4().to_string(),
                vector,
                payload: PointPayload { text },
            })
            .collect();

        let url = format!("{}/collections/{collection}/points", self.base_url);
        let response = self
            .http
            .put(&url)
            .json(&UpsertRequest { points })
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::Upstream(format!(
                "vector store upsert into '{collection}' returned {status}: {body}"
            )));
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: String,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<String>> {
        let url = format!("{}/collections/{collection}/points/search", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&SearchRequest {
                vector,
                limit,
                with_payload: true,
            })
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(%collection, "collection absent, returning no context");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::Upstream(format!(
                "vector store search in '{collection}' returned {status}: {body}"
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Upstream(format!("malformed search response: {e}")))?;
        Ok(parsed
            .result
            .into_iter()
            .filter_map(|hit| hit.payload.map(|p| p.text))
            .collect())
    }
}

/// Embeds a query and gathers context chunks for lesson generation.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    corpus_collection: String,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        corpus_collection: String,
    ) -> Self {
        Self {
            embedder,
            store,
            corpus_collection,
        }
    }

    /// The vector collection holding a learner's uploaded documents.
    pub fn personal_collection(user_id: &str) -> String {
        format!("user-{user_id}")
    }

    /// Top chunks from the shared corpus, plus the learner's own documents
    /// when a user id is given. A failing personal lookup degrades to
    /// corpus-only context rather than failing the lesson.
    pub async fn retrieve(&self, query: &str, user_id: Option<&str>) -> Result<Vec<String>> {
        let vectors = self.embedder.embed(vec![query.to_string()]).await?;
        let query_vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Upstream("empty embedding response".to_string()))?;

        let mut chunks = self
            .store
            .search(
                self.corpus_collection.clone(),
                query_vector.clone(),
                RETRIEVAL_TOP_K,
            )
            .await?;

        if let Some(user_id) = user_id {
            match self
                .store
                .search(
                    Self::personal_collection(user_id),
                    query_vector,
                    RETRIEVAL_TOP_K,
                )
                .await
            {
                Ok(personal) => chunks.extend(personal),
                Err(err) => {
                    warn!(user_id, error = %err, "personal document lookup failed");
                }
            }
        }
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split_text("hello world", 100, 10);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_text("   \n  ", 100, 10).is_empty());
    }

    #[test]
    fn chunks_respect_the_size_limit() {
        let text = "one two three four five six seven eight nine ten ".repeat(20);
        for chunk in split_text(&text, 80, 10) {
            // A chunk may carry the overlap tail plus one joined piece.
            assert!(chunk.chars().count() <= 80 + 10 + 1, "oversized: {chunk:?}");
        }
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let text = format!("{}\n\n{}", "a".repeat(40), "b".repeat(40));
        let chunks = split_text(&text, 50, 0);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with('a'));
        assert!(chunks[1].ends_with('b'));
    }

    #[test]
    fn consecutive_chunks_share_an_overlap() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa".repeat(3);
        let chunks = split_text(&text, 40, 12);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail: String = pair[0]
                .chars()
                .skip(pair[0].chars().count().saturating_sub(12))
                .collect();
            assert!(pair[1].starts_with(&tail), "{:?} !~ {tail:?}", pair[1]);
        }
    }

    #[test]
    fn hard_splits_a_single_giant_token() {
        let text = "x".repeat(500);
        let chunks = split_text(&text, 100, 0);
        assert!(chunks.len() >= 5);
        assert!(chunks.iter().all(|c| c.chars().count() <= 101));
    }

    #[tokio::test]
    async fn retriever_merges_corpus_and_personal_context() {
        let mut embedder = MockEmbedder::new();
        embedder
            .expect_embed()
            .times(1)
            .returning(|_| Ok(vec![vec![0.1, 0.2]]));

        let mut store = MockVectorStore::new();
        store
            .expect_search()
            .withf(|collection, _, _| collection == "lesson-corpus")
            .times(1)
            .returning(|_, _, _| Ok(vec!["corpus chunk".to_string()]));
        store
            .expect_search()
            .withf(|collection, _, _| collection == "user-alex")
            .times(1)
            .returning(|_, _, _| Ok(vec!["personal chunk".to_string()]));

        let retriever = Retriever::new(
            Arc::new(embedder),
            Arc::new(store),
            "lesson-corpus".to_string(),
        );
        let chunks = retriever.retrieve("Lists", Some("alex")).await.unwrap();
        assert_eq!(chunks, vec!["corpus chunk", "personal chunk"]);
    }

    #[tokio::test]
    async fn personal_lookup_failure_degrades_to_corpus_only() {
        let mut embedder = MockEmbedder::new();
        embedder
            .expect_embed()
            .returning(|_| Ok(vec![vec![0.5]]));

        let mut store = MockVectorStore::new();
        store
            .expect_search()
            .withf(|collection, _, _| collection == "lesson-corpus")
            .returning(|_, _, _| Ok(vec!["corpus chunk".to_string()]));
        store
            .expect_search()
            .withf(|collection, _, _| collection.starts_with("user-"))
            .returning(|_, _, _| Err(CoreError::Upstream("down".to_string())));

        let retriever = Retriever::new(
            Arc::new(embedder),
            Arc::new(store),
            "lesson-corpus".to_string(),
        );
        let chunks = retriever.retrieve("Lists", Some("alex")).await.unwrap();
        assert_eq!(chunks, vec!["corpus chunk"]);
    }
}
