use crate::tokenizer::normalize;
use crate::{PageId, PageSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type NodeId = u32;
pub type TermId = u32;

const ROOT: NodeId = 0;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Node {
    children: BTreeMap<char, NodeId>,
    /// Pages holding a word that starts with this prefix.
    pages: PageSet,
    /// Set when the prefix was inserted as a complete word.
    term: Option<TermId>,
}

/// A complete indexed word.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Term {
    pub text: String,
    pub pages: PageSet,
    /// Total insertions across all pages, used to rank the vocabulary.
    pub occurrences: u32,
}

/// Start of one suffix of one vocabulary term.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Suffix {
    term: TermId,
    offset: u32,
}

fn suffix_of<'a>(terms: &'a [Term], s: &Suffix) -> &'a str {
    &terms[s.term as usize].text[s.offset as usize..]
}

/// Prefix trie over normalized words plus a suffix array over the distinct vocabulary.
///
/// Nodes live in a single arena and refer to children by id. The suffix array
/// answers "which words contain this fragment" with two binary searches
/// instead of a walk over every node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstringIndex {
    nodes: Vec<Node>,
    terms: Vec<Term>,
    suffixes: Vec<Suffix>,
    /// False while terms were added after the last `seal`.
    sealed: bool,
}

impl Default for SubstringIndex {
    fn default() -> Self {
        Self { nodes: vec![Node::default()], terms: Vec::new(), suffixes: Vec::new(), sealed: true }
    }
}

impl SubstringIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `page` with the normalized `word` and every leading prefix of it.
    pub fn insert(&mut self, word: &str, page: PageId) {
        let word = normalize(word);
        self.insert_normalized(&word, page);
    }

    pub(crate) fn insert_normalized(&mut self, word: &str, page: PageId) {
        if word.is_empty() {
            return;
        }
        let mut node = ROOT;
        for ch in word.chars() {
            node = match self.nodes[node as usize].children.get(&ch) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len() as NodeId;
                    self.nodes.push(Node::default());
                    self.nodes[node as usize].children.insert(ch, child);
                    child
                }
            };
            self.nodes[node as usize].pages.insert(page);
        }
        let term_id = match self.nodes[node as usize].term {
            Some(id) => id,
            None => {
                let id = self.terms.len() as TermId;
                self.terms.push(Term { text: word.to_string(), pages: PageSet::new(), occurrences: 0 });
                self.nodes[node as usize].term = Some(id);
                self.sealed = false;
                id
            }
        };
        let term = &mut self.terms[term_id as usize];
        term.pages.insert(page);
        term.occurrences += 1;
    }

    /// Rebuild the suffix array after insertions.
    pub fn seal(&mut self) {
        if self.sealed {
            return;
        }
        let terms = &self.terms;
        let mut suffixes: Vec<Suffix> = terms
            .iter()
            .enumerate()
            .flat_map(|(id, term)| {
                term.text
                    .char_indices()
                    .map(move |(offset, _)| Suffix { term: id as TermId, offset: offset as u32 })
            })
            .collect();
        suffixes.sort_unstable_by(|a, b| {
            suffix_of(terms, a).cmp(suffix_of(terms, b)).then(a.term.cmp(&b.term))
        });
        self.suffixes = suffixes;
        self.sealed = true;
    }

    /// Check the arena read back from storage before any lookup touches it.
    ///
    /// Every id must land inside its arena, every node except the root must
    /// have exactly one parent, and every page must be below `num_pages`.
    /// The stored suffix array is discarded and rebuilt from the terms.
    pub(crate) fn validate(&mut self, num_pages: usize) -> Result<(), &'static str> {
        if self.nodes.is_empty() {
            return Err("index has no root node");
        }
        let in_range = |pages: &PageSet| pages.iter().all(|&p| (p as usize) < num_pages);
        let mut parents = vec![0u32; self.nodes.len()];
        for node in &self.nodes {
            for &child in node.children.values() {
                let slot = parents.get_mut(child as usize).ok_or("trie child out of range")?;
                *slot += 1;
            }
            if node.term.map_or(false, |t| t as usize >= self.terms.len()) {
                return Err("trie term out of range");
            }
            if !in_range(&node.pages) {
                return Err("trie page out of range");
            }
        }
        if parents[ROOT as usize] != 0 || parents[1..].iter().any(|&n| n != 1) {
            return Err("trie is not a tree");
        }
        if !self.terms.iter().all(|term| in_range(&term.pages)) {
            return Err("term page out of range");
        }
        self.suffixes.clear();
        self.sealed = false;
        self.seal();
        Ok(())
    }

    fn find_node(&self, normalized: &str) -> Option<&Node> {
        let mut node = ROOT;
        for ch in normalized.chars() {
            node = *self.nodes[node as usize].children.get(&ch)?;
        }
        Some(&self.nodes[node as usize])
    }

    /// Pages where `word` occurs as a complete token.
    pub fn exact_lookup(&self, word: &str) -> PageSet {
        let word = normalize(word);
        self.find_node(&word)
            .and_then(|node| node.term)
            .map(|id| self.terms[id as usize].pages.clone())
            .unwrap_or_default()
    }

    /// Pages holding any word that starts with `prefix`.
    pub fn prefix_lookup(&self, prefix: &str) -> PageSet {
        let prefix = normalize(prefix);
        if prefix.is_empty() {
            return PageSet::new();
        }
        self.find_node(&prefix).map(|node| node.pages.clone()).unwrap_or_default()
    }

    /// Pages holding any word that contains `query` as a contiguous fragment.
    pub fn substring_lookup(&self, query: &str) -> PageSet {
        let query = normalize(query);
        let mut pages = PageSet::new();
        if query.is_empty() {
            return pages;
        }
        for id in self.terms_containing(&query) {
            pages.extend(self.terms[id as usize].pages.iter().copied());
        }
        pages
    }

    fn terms_containing(&self, query: &str) -> Vec<TermId> {
        let mut ids: Vec<TermId> = if self.sealed {
            let start = self
                .suffixes
                .partition_point(|s| suffix_of(&self.terms, s) < query);
            self.suffixes[start..]
                .iter()
                .take_while(|s| suffix_of(&self.terms, s).starts_with(query))
                .map(|s| s.term)
                .collect()
        } else {
            self.terms
                .iter()
                .enumerate()
                .filter(|(_, term)| term.text.contains(query))
                .map(|(id, _)| id as TermId)
                .collect()
        };
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn term(&self, id: TermId) -> Option<&Term> {
        self.terms.get(id as usize)
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Depth-first walk over every prefix in lexicographic order.
    pub fn walk(&self) -> Walk<'_> {
        self.walk_from(ROOT, String::new())
    }

    /// Walk restricted to prefixes extending `prefix`; empty when nothing does.
    pub fn walk_prefix(&self, prefix: &str) -> Walk<'_> {
        let prefix = normalize(prefix);
        let mut node = Some(ROOT);
        for ch in prefix.chars() {
            node = node.and_then(|id| self.nodes[id as usize].children.get(&ch).copied());
        }
        match node {
            Some(id) => self.walk_from(id, prefix),
            None => Walk { index: self, stack: Vec::new() },
        }
    }

    fn walk_from(&self, start: NodeId, prefix: String) -> Walk<'_> {
        Walk { index: self, stack: vec![(start, prefix)] }
    }

    /// Every complete word, in lexicographic order.
    pub fn vocabulary(&self) -> impl Iterator<Item = &Term> + '_ {
        self.walk().filter_map(|entry| entry.term)
    }
}

/// One prefix visited by [`Walk`].
#[derive(Debug)]
pub struct WalkEntry<'a> {
    pub prefix: String,
    pub pages: &'a PageSet,
    pub term: Option<&'a Term>,
}

/// Explicit-stack traversal; depth is bounded by memory, not the call stack.
pub struct Walk<'a> {
    index: &'a SubstringIndex,
    stack: Vec<(NodeId, String)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = WalkEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.index;
        let (id, prefix) = self.stack.pop()?;
        let node = &index.nodes[id as usize];
        for (&ch, &child) in node.children.iter().rev() {
            let mut next = prefix.clone();
            next.push(ch);
            self.stack.push((child, next));
        }
        Some(WalkEntry {
            prefix,
            pages: &node.pages,
            term: node.term.map(|t| &index.terms[t as usize]),
        })
    }
}
