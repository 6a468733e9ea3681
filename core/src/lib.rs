//! Full-text search over a fixed, paginated corpus.
//!
//! Pages are indexed once into a [`SubstringIndex`] (normalized word prefixes
//! plus a suffix array over the vocabulary) and a [`ReferenceGraph`] built
//! from "page N" cross references. Queries run either as free text or as
//! boolean expressions and are ranked by raw match count with the page's
//! authority score as tie-break.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub mod config;
pub mod error;
pub mod graph;
pub mod index;
pub mod persist;
pub mod query;
pub mod search;
pub mod snippet;
pub mod suggest;
pub mod tokenizer;

pub use config::EngineConfig;
pub use error::{Error, QueryError, Result};
pub use graph::ReferenceGraph;
pub use index::SubstringIndex;
pub use search::{Correction, IndexStats, QueryMode, SearchEngine, SearchHit, SearchResults};
pub use snippet::{Fragment, Snippet};
pub use suggest::{Suggester, Suggestion, VocabularySuggester};

/// 0-based page identifier.
pub type PageId = u32;

/// Ordered set of pages, the currency of every lookup and set operation.
pub type PageSet = BTreeSet<PageId>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    /// Text as supplied by the page provider.
    pub text: String,
}

impl Page {
    /// 1-based page number as shown to readers.
    pub fn number(&self) -> u32 {
        self.id + 1
    }
}
