//! Text normalization for the lexical index
//!
//! Produces a sequence of lowercased index terms: alphanumeric word runs
//! for alphabetic scripts, character bigrams for CJK (which has no word
//! boundaries to split on), with stop words and single-character tokens
//! filtered out. The engine is otherwise agnostic to language.

/// Minimum token length kept after filtering
const TOKEN_LEN_MIN: usize = 2;

/// Stop words dropped from both documents and queries. Sorted, binary
/// searched. CJK function characters never survive the bigram + length
/// filter, so no CJK entries are needed here.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "an", "and", "any", "are",
    "at", "be", "been", "before", "being", "below", "between", "both", "but", "by", "can",
    "down", "during", "each", "few", "for", "from", "further", "here", "how", "in", "into",
    "is", "it", "its", "just", "more", "most", "no", "nor", "not", "now", "of", "off", "on",
    "once", "only", "or", "other", "over", "own", "same", "should", "so", "some", "such",
    "than", "that", "the", "their", "then", "there", "these", "they", "this", "through",
    "to", "too", "under", "until", "up", "very", "was", "were", "what", "when", "where",
    "which", "while", "who", "why", "will", "with", "you", "your",
];

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.binary_search(&token).is_ok()
}

fn is_cjk(ch: char) -> bool {
    matches!(ch,
        '\u{4e00}'..='\u{9fff}'        // CJK unified ideographs
        | '\u{3400}'..='\u{4dbf}'      // extension A
        | '\u{3040}'..='\u{30ff}'      // hiragana + katakana
        | '\u{ac00}'..='\u{d7af}')     // hangul syllables
}

/// Tokenize text into normalized index terms.
///
/// Duplicates are preserved: term frequency matters to BM25 scoring.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut cjk_run: Vec<char> = Vec::new();

    let flush_word = |word: &mut String, tokens: &mut Vec<String>| {
        if word.len() >= TOKEN_LEN_MIN && !is_stop_word(word.as_str()) {
            tokens.push(std::mem::take(word));
        } else {
            word.clear();
        }
    };

    let flush_cjk = |run: &mut Vec<char>, tokens: &mut Vec<String>| {
        // Bigrams approximate word segmentation; a lone character carries
        // too little signal and is dropped like any 1-char token.
        for pair in run.windows(2) {
            tokens.push(pair.iter().collect());
        }
        run.clear();
    };

    for ch in text.chars() {
        if is_cjk(ch) {
            flush_word(&mut word, &mut tokens);
            cjk_run.push(ch);
        } else if ch.is_alphanumeric() {
            flush_cjk(&mut cjk_run, &mut tokens);
            word.extend(ch.to_lowercase());
        } else {
            flush_word(&mut word, &mut tokens);
            flush_cjk(&mut cjk_run, &mut tokens);
        }
    }
    flush_word(&mut word, &mut tokens);
    flush_cjk(&mut cjk_run, &mut tokens);

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_words_sorted() {
        let mut sorted = STOP_WORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(
            sorted, STOP_WORDS,
            "STOP_WORDS must stay sorted for binary search"
        );
    }

    #[test]
    fn test_basic_tokenization() {
        let tokens = tokenize("The wizard's name is Elara and she is wise.");
        assert_eq!(tokens, vec!["wizard", "name", "elara", "she", "wise"]);
    }

    #[test]
    fn test_case_folding() {
        assert_eq!(tokenize("ROAR Dragon"), vec!["roar", "dragon"]);
    }

    #[test]
    fn test_short_tokens_dropped() {
        let tokens = tokenize("I x 42 go");
        assert_eq!(tokens, vec!["42", "go"]);
    }

    #[test]
    fn test_duplicates_preserved() {
        let tokens = tokenize("scroll scroll scroll");
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_tier_prefix_becomes_term() {
        // Lexical documents are indexed as "{tier}:{text}"; the colon
        // splits so the tier name itself is searchable.
        let tokens = tokenize("event:Hero draws his sword");
        assert_eq!(tokens[0], "event");
        assert!(tokens.contains(&"sword".to_string()));
    }

    #[test]
    fn test_cjk_bigrams() {
        let tokens = tokenize("古老图书馆");
        assert_eq!(tokens, vec!["古老", "老图", "图书", "书馆"]);
    }

    #[test]
    fn test_mixed_script() {
        let tokens = tokenize("Hero说道hello");
        assert_eq!(tokens, vec!["hero", "说道", "hello"]);
    }

    #[test]
    fn test_empty_and_punctuation_only() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("... !!! ---").is_empty());
    }
}
