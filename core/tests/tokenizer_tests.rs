use folio::tokenizer::{normalize, tokenize};

#[test]
fn it_folds_case_and_diacritics() {
    let toks = tokenize("Running RUNNERS! The café's menu.");
    let words: Vec<String> = toks.into_iter().map(|(w, _)| w).collect();
    assert!(words.contains(&"running".to_string()));
    assert!(words.contains(&"runners".to_string()));
    // Unicode normalization: café -> cafe
    assert!(words.contains(&"cafe".to_string()));
}

#[test]
fn it_keeps_every_word() {
    let toks = tokenize("The quick brown fox and the lazy dog");
    let words: Vec<String> = toks.into_iter().map(|(w, _)| w).collect();
    assert_eq!(words.len(), 8);
    assert_eq!(words.iter().filter(|w| w.as_str() == "the").count(), 2);
}

#[test]
fn it_splits_on_punctuation_and_keeps_digits() {
    let toks = tokenize("page-42: O(n log n)");
    let words: Vec<&str> = toks.iter().map(|(w, _)| w.as_str()).collect();
    assert_eq!(words, vec!["page", "42", "o", "n", "log", "n"]);
    assert_eq!(normalize("Crème Brûlée"), "creme brulee");
}
