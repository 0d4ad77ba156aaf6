//! Text normalization — turns raw extracted text into the two representations
//! the similarity models consume: a cleaned sentence string (word order kept,
//! for the contextual encoder) and a stopword-free lemmatized token sequence
//! (for the bag-of-words models).
//!
//! Pure functions over static linguistic data compiled into the crate; no I/O.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Output of [`normalize`]. `cleaned` preserves word order; `tokens` is the
/// cleaned sequence minus stopwords, each token reduced to its lemma.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub cleaned: String,
    pub tokens: Vec<String>,
}

/// Full normalization pipeline: lowercase, drop emails/URLs, strip
/// non-alphabetic characters, collapse whitespace, remove stopwords,
/// lemmatize. Empty input yields empty outputs.
pub fn normalize(raw_text: &str) -> Normalized {
    let mut cleaned_words: Vec<String> = Vec::new();
    let mut tokens: Vec<String> = Vec::new();

    for word in raw_text.split_whitespace() {
        if looks_like_email(word) || looks_like_url(word) {
            continue;
        }

        // Lowercase and keep only alphabetic runs. A word like "C++/Rust"
        // splits into two cleaned words, matching the original pipeline's
        // symbol-to-space substitution.
        for run in word
            .to_lowercase()
            .split(|c: char| !c.is_ascii_alphabetic())
        {
            if run.is_empty() {
                continue;
            }
            cleaned_words.push(run.to_string());
            if !stopword_set().contains(run) {
                tokens.push(lemmatize(run));
            }
        }
    }

    Normalized {
        cleaned: cleaned_words.join(" "),
        tokens,
    }
}

fn looks_like_email(word: &str) -> bool {
    // Conservative: an '@' with characters on both sides.
    word.split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty())
}

fn looks_like_url(word: &str) -> bool {
    let lower = word.to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("www.")
}

// ────────────────────────────────────────────────────────────────────────────
// Lemmatization — fixed ruleset (irregular-form table + plural suffix rules)
// ────────────────────────────────────────────────────────────────────────────

/// Reduce a lowercase token to its lemma. Noun-oriented, like the reference
/// pipeline's default lemmatizer: irregular plurals come from a fixed table,
/// regular plurals from suffix rules, everything else passes through.
pub fn lemmatize(token: &str) -> String {
    if let Some(lemma) = irregular_lemmas().get(token) {
        return (*lemma).to_string();
    }

    // Order matters: longest suffix first so "studies" doesn't hit the bare
    // "-s" rule and become "studie".
    if token.len() > 4 {
        if let Some(stem) = token.strip_suffix("ies") {
            return format!("{stem}y");
        }
        if let Some(stem) = token.strip_suffix("ves") {
            return format!("{stem}f");
        }
    }
    if token.len() > 3 {
        for suffix in ["ches", "shes", "sses", "xes", "zes"] {
            if let Some(stem) = token.strip_suffix(suffix) {
                // keep the consonant(s): "matches" -> "match", "boxes" -> "box"
                return format!("{stem}{}", &suffix[..suffix.len() - 2]);
            }
        }
    }
    if token.len() > 2
        && token.ends_with('s')
        && !token.ends_with("ss")
        && !token.ends_with("us")
        && !token.ends_with("is")
    {
        return token[..token.len() - 1].to_string();
    }

    token.to_string()
}

fn irregular_lemmas() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        HashMap::from([
            ("men", "man"),
            ("women", "woman"),
            ("children", "child"),
            ("people", "person"),
            ("feet", "foot"),
            ("teeth", "tooth"),
            ("geese", "goose"),
            ("mice", "mouse"),
            ("analyses", "analysis"),
            ("theses", "thesis"),
            ("criteria", "criterion"),
            ("phenomena", "phenomenon"),
            ("indices", "index"),
            ("matrices", "matrix"),
            ("media", "medium"),
        ])
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Stopwords — fixed English set
// ────────────────────────────────────────────────────────────────────────────

fn stopword_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
}

/// English stopword list matching the reference pipeline's corpus.
static STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
    "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
    "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
    "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
    "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
    "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by",
    "for", "with", "about", "against", "between", "into", "through", "during", "before",
    "after", "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over",
    "under", "again", "further", "then", "once", "here", "there", "when", "where", "why",
    "how", "all", "any", "both", "each", "few", "more", "most", "other", "some", "such",
    "no", "nor", "not", "only", "own", "same", "so", "than", "too", "very", "s", "t", "can",
    "will", "just", "don", "should", "now", "d", "ll", "m", "o", "re", "ve", "y", "ain",
    "aren", "couldn", "didn", "doesn", "hadn", "hasn", "haven", "isn", "ma", "mightn",
    "mustn", "needn", "shan", "shouldn", "wasn", "weren", "won", "wouldn",
];

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_empty_outputs() {
        let out = normalize("");
        assert!(out.cleaned.is_empty());
        assert!(out.tokens.is_empty());
    }

    #[test]
    fn test_whitespace_only_yields_empty_outputs() {
        let out = normalize("   \n\t  ");
        assert!(out.cleaned.is_empty());
        assert!(out.tokens.is_empty());
    }

    #[test]
    fn test_lowercases_and_strips_punctuation() {
        let out = normalize("Senior Rust Engineer!");
        assert_eq!(out.cleaned, "senior rust engineer");
        assert_eq!(out.tokens, vec!["senior", "rust", "engineer"]);
    }

    #[test]
    fn test_numbers_are_stripped() {
        let out = normalize("5 years experience");
        assert_eq!(out.cleaned, "years experience");
        // "years" lemmatizes to "year"
        assert_eq!(out.tokens, vec!["year", "experience"]);
    }

    #[test]
    fn test_stopwords_removed_from_tokens_but_kept_in_cleaned() {
        let out = normalize("experience with the machine learning");
        assert_eq!(out.cleaned, "experience with the machine learning");
        assert_eq!(out.tokens, vec!["experience", "machine", "learning"]);
    }

    #[test]
    fn test_emails_and_urls_dropped() {
        let out = normalize("contact jane.doe@example.com or https://example.com/jobs now");
        assert!(!out.cleaned.contains("example"));
        assert_eq!(out.cleaned, "contact or now");
        // "or" and "now" are stopwords
        assert_eq!(out.tokens, vec!["contact"]);
    }

    #[test]
    fn test_symbol_compound_splits_into_words() {
        let out = normalize("C++/Rust developer");
        assert_eq!(out.cleaned, "c rust developer");
    }

    #[test]
    fn test_token_order_preserved() {
        let out = normalize("kubernetes docker terraform");
        assert_eq!(out.tokens, vec!["kubernetes", "docker", "terraform"]);
    }

    #[test]
    fn test_lemmatize_regular_plurals() {
        assert_eq!(lemmatize("apis"), "api");
        assert_eq!(lemmatize("databases"), "database");
        assert_eq!(lemmatize("studies"), "study");
        assert_eq!(lemmatize("matches"), "match");
        assert_eq!(lemmatize("boxes"), "box");
    }

    #[test]
    fn test_lemmatize_irregular_plurals() {
        assert_eq!(lemmatize("people"), "person");
        assert_eq!(lemmatize("analyses"), "analysis");
        assert_eq!(lemmatize("criteria"), "criterion");
    }

    #[test]
    fn test_lemmatize_leaves_non_plurals_alone() {
        assert_eq!(lemmatize("rust"), "rust");
        assert_eq!(lemmatize("class"), "class");
        assert_eq!(lemmatize("analysis"), "analysis");
        assert_eq!(lemmatize("status"), "status");
    }

    #[test]
    fn test_short_words_not_over_stemmed() {
        assert_eq!(lemmatize("as"), "as");
        assert_eq!(lemmatize("is"), "is");
    }
}
