use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use crate::schema::RelType;

fn separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9]+").expect("static regex"))
}

fn camel_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([a-z0-9])([A-Z])").expect("static regex"))
}

/// Folds model-produced relationship names onto UPPER_SNAKE_CASE and onto the
/// spelling already used in the graph when the two differ only in case or separators.
pub struct RelationshipNormalizer {
    /// Maps separator-free key -> canonical name
    aliases: HashMap<String, String>,
}

impl RelationshipNormalizer {
    pub fn new(vocabulary: &BTreeSet<String>) -> Self {
        let mut aliases = HashMap::new();
        for existing in vocabulary {
            let canonical = to_upper_snake(existing);
            if RelType::is_valid(&canonical) {
                aliases.entry(alias_key(&canonical)).or_insert(canonical);
            }
        }
        Self { aliases }
    }

    /// Normalize a relationship name; `None` if it cannot become a valid type.
    ///
    /// Names seen for the first time become canonical for later lookups, so one
    /// response that spells the same relationship two ways still yields one type.
    pub fn normalize(&mut self, name: &str) -> Option<RelType> {
        let normalized = to_upper_snake(name);
        let key = alias_key(&normalized);
        if key.is_empty() {
            return None;
        }

        if let Some(canonical) = self.aliases.get(&key) {
            return RelType::new(canonical.clone()).ok();
        }

        let rel = RelType::new(normalized).ok()?;
        self.aliases.insert(key, rel.as_str().to_string());
        Some(rel)
    }
}

/// "hasEducation", "has education", "Has-Education" -> "HAS_EDUCATION"
pub fn to_upper_snake(name: &str) -> String {
    let split = camel_boundary().replace_all(name.trim(), "${1}_${2}");
    let snake = separators().replace_all(&split, "_");
    snake.trim_matches('_').to_uppercase()
}

fn alias_key(normalized: &str) -> String {
    normalized.replace('_', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalization() {
        assert_eq!(to_upper_snake("has education"), "HAS_EDUCATION");
        assert_eq!(to_upper_snake("hasEducation"), "HAS_EDUCATION");
        assert_eq!(to_upper_snake("  Has-Education! "), "HAS_EDUCATION");
        assert_eq!(to_upper_snake("WORKS_AT"), "WORKS_AT");
    }

    #[test]
    fn test_vocabulary_spelling_wins() {
        let mut normalizer = RelationshipNormalizer::new(&vocab(&["HASEDUCATION"]));

        let rel = normalizer.normalize("has_education").unwrap();
        assert_eq!(rel.as_str(), "HASEDUCATION");
    }

    #[test]
    fn test_first_spelling_becomes_canonical() {
        let mut normalizer = RelationshipNormalizer::new(&BTreeSet::new());

        let n1 = normalizer.normalize("LivesIn").unwrap();
        let n2 = normalizer.normalize("lives in").unwrap();
        assert_eq!(n1, n2);
        assert_eq!(n1.as_str(), "LIVES_IN");
    }

    #[test]
    fn test_unusable_names() {
        let mut normalizer = RelationshipNormalizer::new(&BTreeSet::new());

        assert!(normalizer.normalize("").is_none());
        assert!(normalizer.normalize("---").is_none());
        assert!(normalizer.normalize("2ND_AUTHOR").is_none());
    }
}
