use crate::config::EngineConfig;
use crate::graph::ReferenceGraph;
use crate::index::SubstringIndex;
use crate::query::{self, Resolve, Token};
use crate::snippet::{Matchers, Snippet};
use crate::suggest::{Suggester, Suggestion, VocabularySuggester};
use crate::tokenizer::tokenize;
use crate::{Error, Page, PageId, PageSet, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Completions substituted for one wildcard term.
const WILDCARD_EXPANSION_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    FreeText,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// 1-based position in the full ranking, continuous across result pages.
    pub rank: usize,
    /// 1-based page number in the corpus.
    pub page_number: u32,
    pub match_count: u32,
    pub authority: f64,
    pub snippet: Snippet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub mode: QueryMode,
    pub total_hits: usize,
    pub page: usize,
    pub page_size: usize,
    /// Fewer hits than the configured threshold; callers may offer corrections.
    pub weak_match: bool,
    pub hits: Vec<SearchHit>,
}

/// Replacement candidates for a query term that matched no indexed word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub term: String,
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub pages: usize,
    pub terms: usize,
    pub trie_nodes: usize,
    pub graph_nodes: usize,
    pub graph_edges: usize,
}

/// Everything produced by a build; immutable while queries run.
#[derive(Debug, Clone)]
pub(crate) struct Corpus {
    pub(crate) pages: Vec<Page>,
    pub(crate) index: SubstringIndex,
    pub(crate) graph: ReferenceGraph,
}

impl Resolve for Corpus {
    fn term(&self, term: &str) -> PageSet {
        self.index.exact_lookup(term)
    }

    fn phrase(&self, phrase: &str) -> PageSet {
        let matcher = Matchers::new(&[phrase]);
        self.pages.iter().filter(|p| matcher.is_match(&p.text)).map(|p| p.id).collect()
    }

    fn universe(&self) -> PageSet {
        self.pages.iter().map(|p| p.id).collect()
    }
}

/// Build-once, query-many search over a paginated corpus.
#[derive(Debug, Clone, Default)]
pub struct SearchEngine {
    config: EngineConfig,
    corpus: Option<Corpus>,
}

impl SearchEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, corpus: None }
    }

    pub(crate) fn from_parts(config: EngineConfig, corpus: Corpus) -> Self {
        Self { config, corpus: Some(corpus) }
    }

    pub(crate) fn corpus(&self) -> Result<&Corpus> {
        self.corpus.as_ref().ok_or(Error::NotReady)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the config, rescoring the graph if the authority parameters changed.
    pub fn set_config(&mut self, config: EngineConfig) {
        let rescore = config.iterations != self.config.iterations || config.damping != self.config.damping;
        if let (true, Some(corpus)) = (rescore, self.corpus.as_mut()) {
            corpus.graph.compute_authority(config.iterations, config.damping);
        }
        self.config = config;
    }

    pub fn is_ready(&self) -> bool {
        self.corpus.is_some()
    }

    /// Index `pages` (0-based, in order), build the reference graph and score it.
    ///
    /// Replaces any previous build.
    pub fn build_index<I, S>(&mut self, pages: I) -> IndexStats
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages: Vec<Page> = pages
            .into_iter()
            .enumerate()
            .map(|(id, text)| Page { id: id as PageId, text: text.into() })
            .collect();

        let mut index = SubstringIndex::new();
        for page in &pages {
            for (word, _pos) in tokenize(&page.text) {
                index.insert_normalized(&word, page.id);
            }
        }
        index.seal();

        let mut graph = ReferenceGraph::from_pages(&pages);
        graph.compute_authority(self.config.iterations, self.config.damping);

        self.corpus = Some(Corpus { pages, index, graph });
        let stats = self.stats_unchecked();
        tracing::info!(
            pages = stats.pages,
            terms = stats.terms,
            edges = stats.graph_edges,
            "index build complete"
        );
        stats
    }

    /// Rescore the reference graph with explicit parameters.
    pub fn compute_authority(&mut self, iterations: usize, damping: f64) -> Result<()> {
        let corpus = self.corpus.as_mut().ok_or(Error::NotReady)?;
        corpus.graph.compute_authority(iterations, damping);
        Ok(())
    }

    /// Ranked, paginated search using the index's own vocabulary for wildcards.
    pub fn search(&self, query: &str, page: usize, page_size: usize) -> Result<SearchResults> {
        let corpus = self.corpus()?;
        let suggester = VocabularySuggester::new(&corpus.index);
        self.search_with(query, page, page_size, &suggester)
    }

    /// Like [`SearchEngine::search`] with wildcards expanded by `suggester`.
    pub fn search_with(
        &self,
        query: &str,
        page: usize,
        page_size: usize,
        suggester: &dyn Suggester,
    ) -> Result<SearchResults> {
        let corpus = self.corpus()?;
        let page_size = self.config.check_page_size(page_size)?;
        let tokens = query::expand_wildcards(query::lex(query), suggester, WILDCARD_EXPANSION_LIMIT);
        let mode = if query::is_boolean(&tokens) { QueryMode::Boolean } else { QueryMode::FreeText };
        let matchers = Matchers::new(&query::literals(&tokens));

        let candidates = match mode {
            QueryMode::Boolean => query::evaluate(&tokens, corpus)?,
            QueryMode::FreeText => free_text_candidates(&tokens, corpus),
        };

        let mut ranked: Vec<(PageId, u32, f64)> = candidates
            .into_iter()
            .filter_map(|id| corpus.pages.get(id as usize))
            .map(|p| (p.id, matchers.count(&p.text), corpus.graph.score(p.id)))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then(b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal))
                .then(a.0.cmp(&b.0))
        });

        let total_hits = ranked.len();
        let page = page.max(1);
        let offset = (page - 1).saturating_mul(page_size);
        let hits = ranked
            .into_iter()
            .enumerate()
            .skip(offset)
            .take(page_size)
            .map(|(i, (id, match_count, authority))| SearchHit {
                rank: i + 1,
                page_number: id + 1,
                match_count,
                authority,
                snippet: matchers.snippet(&corpus.pages[id as usize].text, self.config.context_chars),
            })
            .collect();

        tracing::debug!(query, ?mode, total_hits, page, "search complete");
        Ok(SearchResults {
            query: query.to_string(),
            mode,
            total_hits,
            page,
            page_size,
            weak_match: total_hits < self.config.weak_match_threshold,
            hits,
        })
    }

    /// Corrections for every bare query term that is not an indexed word.
    pub fn suggest_corrections(
        &self,
        query: &str,
        suggester: &dyn Suggester,
        limit: usize,
    ) -> Result<Vec<Correction>> {
        let corpus = self.corpus()?;
        let mut out: Vec<Correction> = Vec::new();
        for token in query::lex(query) {
            let term = match token {
                Token::Term(term) => term,
                _ => continue,
            };
            if !corpus.index.exact_lookup(&term).is_empty() || out.iter().any(|c| c.term == term) {
                continue;
            }
            let suggestions = suggester.correct(&term, limit);
            if !suggestions.is_empty() {
                out.push(Correction { term, suggestions });
            }
        }
        Ok(out)
    }

    /// Look up a page by its 1-based number.
    pub fn page(&self, number: u32) -> Result<&Page> {
        let corpus = self.corpus()?;
        let total = corpus.pages.len() as u32;
        number
            .checked_sub(1)
            .and_then(|id| corpus.pages.get(id as usize))
            .ok_or(Error::InvalidPage { number, total })
    }

    pub fn index(&self) -> Result<&SubstringIndex> {
        Ok(&self.corpus()?.index)
    }

    pub fn graph(&self) -> Result<&ReferenceGraph> {
        Ok(&self.corpus()?.graph)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        self.corpus()?;
        Ok(self.stats_unchecked())
    }

    fn stats_unchecked(&self) -> IndexStats {
        match &self.corpus {
            Some(c) => IndexStats {
                pages: c.pages.len(),
                terms: c.index.terms().len(),
                trie_nodes: c.index.node_count(),
                graph_nodes: c.graph.node_count(),
                graph_edges: c.graph.edge_count(),
            },
            None => IndexStats { pages: 0, terms: 0, trie_nodes: 0, graph_nodes: 0, graph_edges: 0 },
        }
    }
}

/// Union of the pages matched by each term (any word containing it) and phrase.
fn free_text_candidates(tokens: &[Token], corpus: &Corpus) -> PageSet {
    let mut pages = PageSet::new();
    for token in tokens {
        match token {
            Token::Term(term) | Token::Wildcard(term) => pages.extend(corpus.index.substring_lookup(term)),
            Token::Phrase(phrase) => pages.extend(corpus.phrase(phrase)),
            _ => {}
        }
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(pages: &[&str]) -> SearchEngine {
        let mut engine = SearchEngine::default();
        engine.build_index(pages.iter().copied());
        engine
    }

    #[test]
    fn search_before_build_is_not_ready() {
        let engine = SearchEngine::default();
        assert!(matches!(engine.search("x", 1, 10), Err(Error::NotReady)));
        assert!(matches!(engine.page(1), Err(Error::NotReady)));
    }

    #[test]
    fn count_outranks_authority() {
        // Page 3 is referenced by both others but mentions "tree" once.
        let engine = engine(&["tree tree see page 3", "tree tree tree, page 3", "tree"]);
        let results = engine.search("tree", 1, 10).unwrap();
        let order: Vec<u32> = results.hits.iter().map(|h| h.page_number).collect();
        assert_eq!(order, vec![2, 1, 3]);
        assert_eq!(results.hits[0].match_count, 3);
    }

    #[test]
    fn authority_breaks_ties() {
        let engine = engine(&["node", "node, see page 3", "node"]);
        let results = engine.search("node", 1, 10).unwrap();
        assert_eq!(results.hits[0].page_number, 3);
        assert!(results.hits[0].authority > results.hits[1].authority);
    }

    #[test]
    fn free_text_matches_substrings_of_words() {
        let engine = engine(&["Unbalanced trees", "balance sheet", "nothing here"]);
        let results = engine.search("balance", 1, 10).unwrap();
        let mut pages: Vec<u32> = results.hits.iter().map(|h| h.page_number).collect();
        pages.sort();
        assert_eq!(pages, vec![1, 2]);
        assert_eq!(results.mode, QueryMode::FreeText);
        assert!(results.weak_match);
    }

    #[test]
    fn page_lookup_is_bounded() {
        let engine = engine(&["one", "two"]);
        assert_eq!(engine.page(2).unwrap().text, "two");
        assert!(matches!(engine.page(0), Err(Error::InvalidPage { number: 0, total: 2 })));
        assert!(matches!(engine.page(3), Err(Error::InvalidPage { number: 3, total: 2 })));
    }

    #[test]
    fn corrections_cover_unknown_terms_only() {
        let engine = engine(&["recursion and iteration"]);
        let index = engine.index().unwrap();
        let suggester = VocabularySuggester::new(index);
        let fixes = engine.suggest_corrections("recurson iteration", &suggester, 3).unwrap();
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].term, "recurson");
        assert_eq!(fixes[0].suggestions[0].term, "recursion");
    }

    #[test]
    fn rescoring_requires_a_build() {
        let mut engine = SearchEngine::default();
        assert!(matches!(engine.compute_authority(20, 0.85), Err(Error::NotReady)));
        engine.build_index(vec!["see page 2", "target"]);
        engine.compute_authority(1, 0.5).unwrap();
        assert!((engine.graph().unwrap().score(0) - 0.25).abs() < 1e-9);
    }
}
