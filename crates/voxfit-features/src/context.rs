// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use voxfit_core::VoxfitError;

/// Splits a word into model subword tokens.
pub trait TokenSplitter {
    fn split(&self, word: &str) -> Vec<String>;
}

/// Splitter treating every word as a single token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WholeWordSplitter;

impl TokenSplitter for WholeWordSplitter {
    fn split(&self, word: &str) -> Vec<String> {
        vec![word.to_string()]
    }
}

/// For each word, the last `ctx_tokens` subwords of the running transcript
/// up to and including that word.
pub fn build_context_windows<T: TokenSplitter + ?Sized>(
    words: &[&str],
    splitter: &T,
    ctx_tokens: usize,
) -> Result<Vec<Vec<String>>, VoxfitError> {
    if ctx_tokens == 0 {
        return Err(VoxfitError::invalid_input("ctx_tokens must be >= 1; got 0"));
    }
    let mut stream: Vec<String> = Vec::new();
    let mut windows = Vec::with_capacity(words.len());
    for word in words {
        stream.extend(splitter.split(word));
        let start = stream.len().saturating_sub(ctx_tokens);
        windows.push(stream[start..].to_vec());
    }
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::{TokenSplitter, WholeWordSplitter, build_context_windows};

    struct CharPairs;

    impl TokenSplitter for CharPairs {
        fn split(&self, word: &str) -> Vec<String> {
            let chars: Vec<char> = word.chars().collect();
            chars.chunks(2).map(|pair| pair.iter().collect()).collect()
        }
    }

    #[test]
    fn whole_word_windows_slide_over_transcript() {
        let windows =
            build_context_windows(&["a", "b", "c", "d"], &WholeWordSplitter, 2).expect("valid");
        assert_eq!(windows[0], vec!["a"]);
        assert_eq!(windows[1], vec!["a", "b"]);
        assert_eq!(windows[3], vec!["c", "d"]);
    }

    #[test]
    fn subword_tokens_count_toward_context() {
        let windows = build_context_windows(&["hello", "ok"], &CharPairs, 3).expect("valid");
        assert_eq!(windows[0], vec!["he", "ll", "o"]);
        assert_eq!(windows[1], vec!["ll", "o", "ok"]);
    }

    #[test]
    fn zero_context_is_rejected() {
        assert!(build_context_windows(&["x"], &WholeWordSplitter, 0).is_err());
    }
}
