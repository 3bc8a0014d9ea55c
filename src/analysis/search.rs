//! Name search over the string table.

use hashbrown::HashSet;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::filter::ResolvedFilter;
use crate::graph::SnapshotGraph;
use crate::snapshot_error::SnapshotError;

/// A search request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    pub query: String,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub is_regex: bool,
}

impl SearchConfig {
    pub fn plain(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            case_sensitive: false,
            is_regex: false,
        }
    }

    pub fn regex(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            case_sensitive: true,
            is_regex: true,
        }
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }
}

enum Matcher<'q> {
    Substring(&'q str),
    Pattern(Regex),
}

impl<'q> Matcher<'q> {
    fn new(config: &'q SearchConfig) -> Result<Self, SnapshotError> {
        if !config.is_regex && config.case_sensitive {
            return Ok(Matcher::Substring(&config.query));
        }
        let pattern = if config.is_regex {
            config.query.clone()
        } else {
            regex::escape(&config.query)
        };
        RegexBuilder::new(&pattern)
            .case_insensitive(!config.case_sensitive)
            .build()
            .map(Matcher::Pattern)
            .map_err(|e| SnapshotError::InvalidSearchQuery(e.to_string()))
    }

    fn is_match(&self, s: &str) -> bool {
        match self {
            Matcher::Substring(q) => s.contains(q),
            Matcher::Pattern(re) => re.is_match(s),
        }
    }
}

/// Ids of nodes whose raw name matches `config`, in node order.
///
/// # Errors
/// [`SnapshotError::InvalidSearchQuery`] when a regex query does not compile.
pub fn search(
    graph: &SnapshotGraph,
    config: &SearchConfig,
    filter: &ResolvedFilter,
) -> Result<Vec<u32>, SnapshotError> {
    let matcher = Matcher::new(config)?;
    let matched: HashSet<u32> = graph
        .strings
        .iter()
        .enumerate()
        .filter(|(_, s)| matcher.is_match(s))
        .map(|(i, _)| i as u32)
        .collect();
    if matched.is_empty() {
        return Ok(Vec::new());
    }
    Ok((0..graph.node_count as u32)
        .filter(|&o| filter.matches(graph, o))
        .filter(|&o| matched.contains(&graph.node_name_index(o)))
        .map(|o| graph.node_id(o))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{NodeType, SnapshotBuilder};

    fn graph() -> SnapshotGraph {
        let mut b = SnapshotBuilder::new();
        b.add_node(NodeType::Synthetic, "", 1, 0);
        b.add_node(NodeType::Object, "HTMLDivElement", 3, 10);
        b.add_node(NodeType::Object, "htmlparser", 5, 10);
        b.add_node(NodeType::String, "a.b", 7, 10);
        let raw = b.build();
        SnapshotGraph::from_parts(&raw.snapshot, raw.nodes, raw.edges, raw.strings).unwrap()
    }

    #[test]
    fn plain_search_ignores_case_by_default() {
        let g = graph();
        let ids = search(&g, &SearchConfig::plain("html"), &ResolvedFilter::All).unwrap();
        assert_eq!(ids, vec![3, 5]);
        let ids = search(
            &g,
            &SearchConfig::plain("html").case_sensitive(true),
            &ResolvedFilter::All,
        )
        .unwrap();
        assert_eq!(ids, vec![5]);
    }

    #[test]
    fn plain_queries_are_literal() {
        let g = graph();
        assert_eq!(search(&g, &SearchConfig::plain("."), &ResolvedFilter::All).unwrap(), vec![7]);
    }

    #[test]
    fn regex_search_and_errors() {
        let g = graph();
        let ids = search(&g, &SearchConfig::regex("^HTML.*Element$"), &ResolvedFilter::All).unwrap();
        assert_eq!(ids, vec![3]);
        let err = search(&g, &SearchConfig::regex("("), &ResolvedFilter::All).unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidSearchQuery(_)));
    }

    #[test]
    fn filter_applies_to_matches() {
        let g = graph();
        let ids = search(
            &g,
            &SearchConfig::plain("html"),
            &ResolvedFilter::IdRange { min: 3, max: 10 },
        )
        .unwrap();
        assert_eq!(ids, vec![5]);
    }
}
