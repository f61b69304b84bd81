//! Topic Graph
//!
//! The mastery graph is loaded once at startup from a JSON file shaped
//! `{category: {topicTitle: {id, prerequisites[], concepts[]}}}` and treated
//! as immutable for the process lifetime. Topics are flattened into the
//! file's declaration order, which is the deterministic iteration order used
//! by the progression resolvers.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A single learning topic: a node in the prerequisite DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub title: String,
    pub category: String,
    pub prerequisites: Vec<String>,
    /// Sub-concepts of the topic, used by the misconception diagnosis.
    pub concepts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawTopic {
    id: String,
    #[serde(default)]
    prerequisites: Vec<String>,
    #[serde(default)]
    concepts: Vec<String>,
}

/// The full prerequisite graph, validated at load time.
#[derive(Debug, Clone, Default)]
pub struct TopicGraph {
    topics: Vec<Topic>,
    by_id: HashMap<String, usize>,
    by_title: HashMap<String, usize>,
}

impl TopicGraph {
    /// Loads and validates the graph from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Validation(format!("cannot read topic graph {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    /// Parses and validates the graph from a JSON string.
    ///
    /// A graph that references a prerequisite id absent from the graph, that
    /// repeats a topic id or title, or that lists a topic as its own
    /// prerequisite is a configuration error and is rejected here rather
    /// than left to silently block progression later.
    pub fn from_json(raw: &str) -> Result<Self> {
        let root: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw)
            .map_err(|e| CoreError::Validation(format!("malformed topic graph: {e}")))?;

        let mut topics = Vec::new();
        for (category, entries) in &root {
            let entries = entries.as_object().ok_or_else(|| {
                CoreError::Validation(format!("category '{category}' is not an object"))
            })?;
            for (title, details) in entries {
                let raw_topic: RawTopic = serde_json::from_value(details.clone()).map_err(|e| {
                    CoreError::Validation(format!("malformed topic '{title}': {e}"))
                })?;
                topics.push(Topic {
                    id: raw_topic.id,
                    title: title.clone(),
                    category: category.clone(),
                    prerequisites: raw_topic.prerequisites,
                    concepts: raw_topic.concepts,
                });
            }
        }

        Self::from_topics(topics)
    }

    /// Builds a validated graph from an already-flattened topic list.
    pub fn from_topics(topics: Vec<Topic>) -> Result<Self> {
        let mut by_id = HashMap::new();
        let mut by_title = HashMap::new();
        for (idx, topic) in topics.iter().enumerate() {
            if by_id.insert(topic.id.clone(), idx).is_some() {
                return Err(CoreError::Validation(format!(
                    "duplicate topic id '{}'",
                    topic.id
                )));
            }
            if by_title.insert(topic.title.clone(), idx).is_some() {
                return Err(CoreError::Validation(format!(
                    "duplicate topic title '{}'",
                    topic.title
                )));
            }
        }
        for topic in &topics {
            for prereq in &topic.prerequisites {
                if prereq == &topic.id {
                    return Err(CoreError::Validation(format!(
                        "topic '{}' lists itself as a prerequisite",
                        topic.id
                    )));
                }
                if !by_id.contains_key(prereq) {
                    return Err(CoreError::Validation(format!(
                        "topic '{}' requires unknown prerequisite '{prereq}'",
                        topic.id
                    )));
                }
            }
        }

        Ok(Self {
            topics,
            by_id,
            by_title,
        })
    }

    /// All topics in declaration order.
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn get(&self, id: &str) -> Option<&Topic> {
        self.by_id.get(id).map(|&idx| &self.topics[idx])
    }

    pub fn get_by_title(&self, title: &str) -> Option<&Topic> {
        self.by_title.get(title).map(|&idx| &self.topics[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
