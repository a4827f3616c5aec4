// Stop-word list shared across every text stage of a run.

use std::collections::BTreeSet;

use stop_words::{get, LANGUAGE};

/// Words that never carry topic signal in review text.
const REVIEW_NOISE: &[&str] = &["star", "stars"];

/// A case-insensitive stop-word set.
#[derive(Debug, Clone, Default)]
pub struct StopWords {
    words: BTreeSet<String>,
}

impl StopWords {
    /// English stop words plus review boilerplate.
    pub fn english() -> Self {
        let english: Vec<String> = get(LANGUAGE::English);
        let words = english
            .into_iter()
            .map(|w| w.to_lowercase())
            .chain(REVIEW_NOISE.iter().map(|w| w.to_string()))
            .collect();
        Self { words }
    }

    /// English stop words, review boilerplate, and every word of the dataset
    /// name. A "Digital Music" file would otherwise label every topic "music".
    pub fn for_dataset(dataset_name: &str) -> Self {
        let mut stop = Self::english();
        stop.extend(dataset_name.split_whitespace());
        stop
    }

    /// A set with exactly the given words.
    pub fn custom<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stop = Self::default();
        stop.extend(words);
        stop
    }

    pub fn extend<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.words
            .extend(words.into_iter().map(|w| w.as_ref().to_lowercase()));
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.words.iter()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_includes_review_noise() {
        let stop = StopWords::english();
        assert!(stop.contains("the"));
        assert!(stop.contains("stars"));
        assert!(!stop.contains("kettle"));
    }

    #[test]
    fn test_dataset_words_are_lowercased() {
        let stop = StopWords::for_dataset("Digital Music");
        assert!(stop.contains("digital"));
        assert!(stop.contains("music"));
    }
}
