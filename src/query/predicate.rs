//! Search predicate and its column-wise evaluation

use crate::query::error::{QueryError, QueryResult};
use crate::storage::types::Block;

/// Filter applied to every row of every segment
///
/// Construction validates the predicate, so a `Predicate` value always has
/// at least one filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    source: Option<String>,
    contains: Option<String>,
}

impl Predicate {
    /// Build a predicate; empty strings count as absent
    pub fn new(source: Option<String>, contains: Option<String>) -> QueryResult<Self> {
        let source = source.filter(|s| !s.is_empty());
        let contains = contains.filter(|s| !s.is_empty());

        if source.is_none() && contains.is_none() {
            return Err(QueryError::Validation(
                "at least one of 'source' or 'contains' is required".into(),
            ));
        }

        Ok(Self { source, contains })
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn contains(&self) -> Option<&str> {
        self.contains.as_deref()
    }

    /// Indices of matching rows, in row order
    ///
    /// The cheap equality test on `sources` runs first; the substring test
    /// only sees rows that survived it.
    pub fn matching_rows(&self, block: &Block) -> Vec<usize> {
        let messages = block.messages();

        match (self.source.as_deref(), self.contains.as_deref()) {
            (Some(source), needle) => {
                let candidates = block
                    .sources()
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.as_str() == source)
                    .map(|(i, _)| i);

                match needle {
                    Some(needle) => candidates
                        .filter(|&i| messages[i].contains(needle))
                        .collect(),
                    None => candidates.collect(),
                }
            }
            (None, Some(needle)) => messages
                .iter()
                .enumerate()
                .filter(|(_, m)| m.contains(needle))
                .map(|(i, _)| i)
                .collect(),
            (None, None) => Vec::new(),
        }
    }
}
