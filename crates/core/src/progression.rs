//! Topic Progression Resolver
//!
//! Selects the next topic for a learner from the prerequisite graph. Both
//! resolvers iterate in graph declaration order, so ties between several
//! simultaneously-eligible topics are broken deterministically.

use std::collections::BTreeSet;

use crate::graph::{Topic, TopicGraph};

/// Returns the first topic, in declaration order, that the learner has not
/// mastered and whose prerequisites are all contained in `mastered`.
///
/// Returns `None` once every topic in the graph is mastered. The caller
/// decides which mastery field counts as "mastered"; the resolver only sees
/// the set of ids.
pub fn next_unlocked_topic<'a>(
    graph: &'a TopicGraph,
    mastered: &BTreeSet<String>,
) -> Option<&'a Topic> {
    graph.topics().iter().find(|topic| {
        !mastered.contains(&topic.id)
            && topic
                .prerequisites
                .iter()
                .all(|prereq| mastered.contains(prereq))
    })
}

/// Returns the first claimed topic, in declaration order, that has been
/// neither verified nor marked struggling, or `None` when onboarding has
/// nothing left to verify.
pub fn next_unverified_claimed_topic<'a>(
    graph: &'a TopicGraph,
    claimed: &BTreeSet<String>,
    verified: &BTreeSet<String>,
    struggling: &BTreeSet<String>,
) -> Option<&'a Topic> {
    graph.topics().iter().find(|topic| {
        claimed.contains(&topic.id)
            && !verified.contains(&topic.id)
            && !struggling.contains(&topic.id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TopicGraph;

    fn topic(id: &str, prerequisites: &[&str]) -> Topic {
        Topic {
            id: id.to_string(),
            title: id.to_uppercase(),
            category: "test".to_string(),
            prerequisites: prerequisites.iter().map(|s| s.to_string()).collect(),
            concepts: Vec::new(),
        }
    }

    fn graph(topics: Vec<Topic>) -> TopicGraph {
        TopicGraph::from_topics(topics).unwrap()
    }

    fn ids(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn walks_a_linear_chain() {
        let g = graph(vec![topic("a", &[]), topic("b", &["a"])]);

        assert_eq!(next_unlocked_topic(&g, &ids(&[])).unwrap().id, "a");
        assert_eq!(next_unlocked_topic(&g, &ids(&["a"])).unwrap().id, "b");
        assert!(next_unlocked_topic(&g, &ids(&["a", "b"])).is_none());
    }

    #[test]
    fn never_returns_a_topic_with_unmet_prerequisites() {
        let g = graph(vec![
            topic("a", &[]),
            topic("b", &["a"]),
            topic("c", &["a", "b"]),
        ]);

        for mastered in [ids(&[]), ids(&["a"]), ids(&["b"]), ids(&["a", "b"])] {
            if let Some(next) = next_unlocked_topic(&g, &mastered) {
                assert!(!mastered.contains(&next.id));
                assert!(next.prerequisites.iter().all(|p| mastered.contains(p)));
            }
        }
    }

    #[test]
    fn empty_prerequisites_are_always_eligible_until_mastered() {
        let g = graph(vec![topic("root", &[]), topic("leaf", &["root"])]);
        assert_eq!(next_unlocked_topic(&g, &ids(&["leaf"])).unwrap().id, "root");
    }

    #[test]
    fn declaration_order_breaks_ties() {
        // Both "b" and "c" unlock once "a" is mastered; "b" is declared first.
        let g = graph(vec![topic("a", &[]), topic("b", &["a"]), topic("c", &["a"])]);
        assert_eq!(next_unlocked_topic(&g, &ids(&["a"])).unwrap().id, "b");
    }

    #[test]
    fn completion_returns_none() {
        let g = graph(vec![topic("a", &[]), topic("b", &["a"])]);
        let everything = ids(&["a", "b"]);
        assert!(next_unlocked_topic(&g, &everything).is_none());
    }

    #[test]
    fn unverified_claimed_resolution() {
        let g = graph(vec![topic("a", &[]), topic("b", &["a"]), topic("c", &["a"])]);

        let claimed = ids(&["a", "b", "c"]);
        let next =
            next_unverified_claimed_topic(&g, &claimed, &ids(&["a"]), &ids(&["b"])).unwrap();
        assert_eq!(next.id, "c");
    }

    #[test]
    fn nothing_left_to_verify_returns_none() {
        let g = graph(vec![topic("a", &[]), topic("b", &["a"])]);

        let claimed = ids(&["a", "b"]);
        assert!(
            next_unverified_claimed_topic(&g, &claimed, &ids(&["a"]), &ids(&["b"])).is_none()
        );
        assert!(
            next_unverified_claimed_topic(&g, &ids(&[]), &ids(&[]), &ids(&[])).is_none()
        );
    }
}
