use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"\w+").expect("valid regex");
}

/// Case-fold and strip diacritics: "Café" -> "cafe".
pub fn normalize(word: &str) -> String {
    word.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Tokenize text into (normalized word, position) pairs over maximal word runs.
///
/// Unlike a retrieval tokenizer there is no stopword removal or stemming:
/// every word must stay reachable by exact and substring lookup.
pub fn tokenize(text: &str) -> Vec<(String, usize)> {
    WORD.find_iter(text)
        .enumerate()
        .map(|(pos, mat)| (normalize(mat.as_str()), pos))
        .filter(|(word, _)| !word.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Recursion, explained here!");
        let words: Vec<&str> = t.iter().map(|(w, _)| w.as_str()).collect();
        assert_eq!(words, vec!["recursion", "explained", "here"]);
        assert_eq!(t[2].1, 2);
    }

    #[test]
    fn normalize_strips_marks() {
        assert_eq!(normalize("Ångström"), "angstrom");
        assert_eq!(normalize("NAÏVE"), "naive");
    }
}
