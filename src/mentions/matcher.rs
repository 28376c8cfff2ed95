use std::collections::HashSet;

use crate::db::TrackedEntity;

/// Keywords shorter than this never match; short fragments produce too
/// many false positives.
const MIN_KEYWORD_LEN: usize = 4;

/// Case-insensitive substring matcher over the tracked-entity roster.
/// Keyword sets are built once at construction; matching is pure.
pub struct MentionMatcher {
    keywords: Vec<(i64, Vec<String>)>,
}

impl MentionMatcher {
    pub fn new(entities: &[TrackedEntity]) -> Self {
        let keywords = entities
            .iter()
            .map(|entity| {
                let first = entity.first_name.trim().to_lowercase();
                let last = entity.last_name.trim().to_lowercase();

                let mut candidates = HashSet::new();
                let full = format!("{} {}", first, last).trim().to_string();
                candidates.insert(full);
                candidates.insert(last);

                let keywords = candidates
                    .into_iter()
                    .filter(|kw| kw.chars().count() >= MIN_KEYWORD_LEN)
                    .collect::<Vec<_>>();

                (entity.id, keywords)
            })
            .collect();

        MentionMatcher { keywords }
    }

    /// Entity IDs mentioned in `text`, each at most once no matter how many
    /// of its keywords hit.
    pub fn find_mentions(&self, text: &str) -> Vec<i64> {
        let haystack = text.to_lowercase();

        let mut mentioned = Vec::new();
        for (entity_id, keywords) in &self.keywords {
            if keywords.iter().any(|kw| haystack.contains(kw.as_str())) {
                mentioned.push(*entity_id);
            }
        }
        mentioned
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.iter().all(|(_, kws)| kws.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: i64, first: &str, last: &str) -> TrackedEntity {
        TrackedEntity {
            id,
            first_name: first.to_string(),
            last_name: last.to_string(),
        }
    }

    #[test]
    fn matches_full_name_and_last_name() {
        let matcher = MentionMatcher::new(&[entity(1, "Maria", "Keller")]);
        assert_eq!(matcher.find_mentions("Minister Maria Keller said"), vec![1]);
        assert_eq!(matcher.find_mentions("KELLER announces reform"), vec![1]);
        assert!(matcher.find_mentions("no politicians here").is_empty());
    }

    #[test]
    fn short_keywords_never_match() {
        // "ng" and "bo ng" are both under the minimum; only nothing matches.
        let matcher = MentionMatcher::new(&[entity(7, "Bo", "Ng")]);
        assert!(matcher.find_mentions("boxing match tonight").is_empty());
        assert!(matcher.find_mentions("bo ng").is_empty());
        assert!(matcher.is_empty());
    }

    #[test]
    fn entity_counted_once_despite_multiple_keyword_hits() {
        let matcher = MentionMatcher::new(&[entity(3, "Jonas", "Berger")]);
        let hits = matcher.find_mentions("Jonas Berger met Berger's staff");
        assert_eq!(hits, vec![3]);
    }

    #[test]
    fn multiple_entities_all_reported() {
        let matcher = MentionMatcher::new(&[
            entity(1, "Maria", "Keller"),
            entity(2, "Jonas", "Berger"),
        ]);
        let mut hits = matcher.find_mentions("Keller debated Berger");
        hits.sort();
        assert_eq!(hits, vec![1, 2]);
    }
}
