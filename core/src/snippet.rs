use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// One context window cut from a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,
    /// Byte ranges of `text` to emphasize, sorted and non-overlapping.
    pub highlights: Vec<(usize, usize)>,
}

impl Fragment {
    pub fn render(&self, open: &str, close: &str) -> String {
        let mut out = String::with_capacity(self.text.len() + self.highlights.len() * (open.len() + close.len()));
        let mut last = 0;
        for &(start, end) in &self.highlights {
            out.push_str(&self.text[last..start]);
            out.push_str(open);
            out.push_str(&self.text[start..end]);
            out.push_str(close);
            last = end;
        }
        out.push_str(&self.text[last..]);
        out
    }
}

/// Context windows around every match on a page. Rendering is left to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub fragments: Vec<Fragment>,
}

impl Snippet {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Join the fragments with `separator`, wrapping matches in `open`/`close`.
    pub fn render(&self, open: &str, close: &str, separator: &str) -> String {
        self.fragments
            .iter()
            .map(|f| f.render(open, close))
            .collect::<Vec<_>>()
            .join(separator)
    }

    pub fn plain(&self, separator: &str) -> String {
        self.render("", "", separator)
    }
}

/// Case-insensitive literal matchers for the terms and phrases of one query.
pub struct Matchers {
    patterns: Vec<Regex>,
}

impl Matchers {
    pub fn new<S: AsRef<str>>(literals: &[S]) -> Self {
        let patterns = literals
            .iter()
            .filter(|l| !l.as_ref().trim().is_empty())
            .filter_map(|l| {
                RegexBuilder::new(&regex::escape(l.as_ref()))
                    .case_insensitive(true)
                    .build()
                    .ok()
            })
            .collect();
        Self { patterns }
    }

    /// Occurrences of every literal in `text`, summed.
    pub fn count(&self, text: &str) -> u32 {
        self.patterns.iter().map(|re| re.find_iter(text).count() as u32).sum()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(text))
    }

    /// Cut a window of `context` characters around each occurrence, literal by literal.
    pub fn snippet(&self, text: &str, context: usize) -> Snippet {
        let mut fragments = Vec::new();
        for re in &self.patterns {
            for m in re.find_iter(text) {
                let start = back_chars(text, m.start(), context);
                let end = forward_chars(text, m.end(), context);
                let window = &text[start..end];
                fragments.push(Fragment { text: window.to_string(), highlights: self.highlights(window) });
            }
        }
        Snippet { fragments }
    }

    fn highlights(&self, window: &str) -> Vec<(usize, usize)> {
        let mut ranges: Vec<(usize, usize)> = self
            .patterns
            .iter()
            .flat_map(|re| re.find_iter(window).map(|m| (m.start(), m.end())))
            .collect();
        ranges.sort_unstable();
        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }
        merged
    }
}

fn back_chars(text: &str, from: usize, n: usize) -> usize {
    if n == 0 {
        return from;
    }
    text[..from].char_indices().rev().nth(n - 1).map(|(i, _)| i).unwrap_or(0)
}

fn forward_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..].char_indices().nth(n).map(|(i, _)| from + i).unwrap_or(text.len())
}
