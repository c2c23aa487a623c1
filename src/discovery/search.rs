//! Keyword search over catalog metadata.
//!
//! Lowercased copies of every tool's name, summary and capability id are
//! kept so a search never touches a handler.

use crate::catalog::ToolCatalog;

const NAME_HIT: u32 = 3;
const SUMMARY_HIT: u32 = 2;
const CAPABILITY_HIT: u32 = 1;
const PHRASE_BONUS: u32 = 2;

#[derive(Debug, Clone)]
struct IndexedTool {
    name: String,
    summary: String,
    capability: String,
}

/// Search index in catalog declaration order.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    entries: Vec<IndexedTool>,
}

impl SearchIndex {
    pub fn build(catalog: &ToolCatalog) -> Self {
        let entries = catalog
            .list_tools(None)
            .into_iter()
            .map(|tool| IndexedTool {
                name: tool.name.to_lowercase(),
                summary: tool.summary.to_lowercase(),
                capability: tool.capability_id.as_str().to_lowercase(),
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Positions (into the catalog's tool list) of tools matching `query`,
    /// best first.
    ///
    /// Any whitespace-separated keyword hitting the name, summary or
    /// capability id is a match. Equal scores keep declaration order. A blank
    /// query matches everything in declaration order.
    pub fn rank(&self, query: &str) -> Vec<usize> {
        let query = query.to_lowercase();
        let keywords: Vec<&str> = query.split_whitespace().collect();
        if keywords.is_empty() {
            return (0..self.entries.len()).collect();
        }

        let phrase = keywords.join(" ");
        let joined = keywords.join("_");

        let mut scored: Vec<(usize, u32)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(pos, entry)| {
                let score = score(entry, &keywords, &phrase, &joined);
                (score > 0).then_some((pos, score))
            })
            .collect();

        // sort_by is stable: ties stay in declaration order.
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.into_iter().map(|(pos, _)| pos).collect()
    }
}

fn score(entry: &IndexedTool, keywords: &[&str], phrase: &str, joined: &str) -> u32 {
    let mut score = 0;
    for keyword in keywords {
        if entry.name.contains(keyword) {
            score += NAME_HIT;
        }
        if entry.summary.contains(keyword) {
            score += SUMMARY_HIT;
        }
        if entry.capability.contains(keyword) {
            score += CAPABILITY_HIT;
        }
    }
    if score > 0 && (entry.name.contains(phrase) || entry.name.contains(joined)) {
        score += PHRASE_BONUS;
    }
    score
}
