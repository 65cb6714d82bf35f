//! Exact/partial include and exclude clauses over plain text.

use serde::{Deserialize, Deserializer, Serialize};

fn default_true() -> bool {
    true
}

/// Accepts either a single string or a list of strings.
pub(crate) fn one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(String),
        Many(Vec<String>),
    }
    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::One(text) => vec![text],
        Raw::Many(list) => list,
    }))
}

/// Four independent clauses. Each `*-or` toggle picks whether one hit (OR) or every pattern
/// (AND) satisfies its clause. An empty or absent pattern list disables the clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TextFilter {
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub exact: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub exact_or: bool,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub partial: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub partial_or: bool,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub ignore_exact: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub ignore_exact_or: bool,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub ignore_partial: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub ignore_partial_or: bool,
}

impl Default for TextFilter {
    fn default() -> Self {
        Self {
            exact: None,
            exact_or: true,
            partial: None,
            partial_or: true,
            ignore_exact: None,
            ignore_exact_or: true,
            ignore_partial: None,
            ignore_partial_or: true,
        }
    }
}

/// Non-empty pattern list, if configured.
pub(crate) fn patterns(list: Option<&Vec<String>>) -> Option<&[String]> {
    list.map(Vec::as_slice).filter(|list| !list.is_empty())
}

/// OR: any hit. AND: every pattern hits.
pub(crate) fn combine<T>(patterns: &[T], any: bool, hit: impl Fn(&T) -> bool) -> bool {
    if any {
        patterns.iter().any(hit)
    } else {
        patterns.iter().all(hit)
    }
}

impl TextFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        patterns(self.exact.as_ref()).is_none()
            && patterns(self.partial.as_ref()).is_none()
            && patterns(self.ignore_exact.as_ref()).is_none()
            && patterns(self.ignore_partial.as_ref()).is_none()
    }

    /// A pattern hits when any of `texts` equals it (exact) or contains it (partial).
    #[must_use]
    pub fn matches(&self, texts: &[&str]) -> bool {
        let exact = |pattern: &String| texts.iter().any(|text| *text == pattern);
        let partial = |pattern: &String| texts.iter().any(|text| text.contains(pattern.as_str()));

        if let Some(list) = patterns(self.exact.as_ref()) {
            if !combine(list, self.exact_or, exact) {
                return false;
            }
        }
        if let Some(list) = patterns(self.partial.as_ref()) {
            if !combine(list, self.partial_or, partial) {
                return false;
            }
        }
        if let Some(list) = patterns(self.ignore_exact.as_ref()) {
            if combine(list, self.ignore_exact_or, exact) {
                return false;
            }
        }
        if let Some(list) = patterns(self.ignore_partial.as_ref()) {
            if combine(list, self.ignore_partial_or, partial) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(json: &str) -> TextFilter {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn string_or_list_both_parse() {
        assert_eq!(filter(r#"{ "partial": "sky" }"#).partial, Some(vec!["sky".to_string()]));
        assert_eq!(
            filter(r#"{ "partial": ["sky", "sea"], "partial-or": false }"#).partial,
            Some(vec!["sky".to_string(), "sea".to_string()])
        );
        assert!(filter("{}").is_empty());
    }

    #[test]
    fn or_and_toggles() {
        let any = filter(r#"{ "partial": ["sky", "sea"] }"#);
        assert!(any.matches(&["blue sky", ""]));
        let all = filter(r#"{ "partial": ["sky", "sea"], "partial-or": false }"#);
        assert!(!all.matches(&["blue sky", ""]));
        assert!(all.matches(&["blue sky", "by the sea"]));
    }

    #[test]
    fn ignore_clauses_reject() {
        let f = filter(r#"{ "ignore-partial": "wip", "ignore-exact": ["draft"] }"#);
        assert!(f.matches(&["finished", "caption"]));
        assert!(!f.matches(&["sketch (wip)", ""]));
        assert!(!f.matches(&["draft", ""]));
        assert!(f.matches(&["drafted", ""]));
    }

    #[test]
    fn exact_is_whole_field() {
        let f = filter(r#"{ "exact": "sky" }"#);
        assert!(f.matches(&["title", "sky"]));
        assert!(!f.matches(&["skyline", ""]));
    }
}
