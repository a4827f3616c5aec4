// YAKE keyword extraction.
//
// Unsupervised and deterministic: candidates are scored from in-text
// statistics only (position, frequency, spread across sentences, casing).
// Lower YAKE scores are better; results come back best first.
//
// The sentence segmenter inside YAKE gives up on very long runs without a
// terminal, so input is cut into paragraphs of bounded length first.

use std::borrow::Cow;
use std::collections::HashSet;

use yake_rust::{get_n_best, Config, StopWords as YakeStopWords};

use super::traits::KeywordExtractor;
use crate::text::stopwords::StopWords;

/// Longest run of words without a sentence terminal handed to the segmenter.
const MAX_RUN_WORDS: usize = 1000;

pub struct YakeExtractor {
    stop_words: YakeStopWords,
    config: Config,
}

impl YakeExtractor {
    /// Unigram extractor that skips `stop_words`.
    pub fn new(stop_words: &StopWords) -> Self {
        let words: HashSet<String> = stop_words.iter().cloned().collect();
        Self {
            stop_words: YakeStopWords::custom(words),
            config: Config {
                ngrams: 1,
                remove_duplicates: true,
                ..Config::default()
            },
        }
    }
}

impl KeywordExtractor for YakeExtractor {
    fn extract(&self, text: &str, top_k: usize) -> Vec<String> {
        if text.trim().is_empty() || top_k == 0 {
            return Vec::new();
        }
        let text = bound_sentence_runs(text, MAX_RUN_WORDS);
        get_n_best(top_k, &text, &self.stop_words, &self.config)
            .into_iter()
            .map(|item| item.keyword.to_lowercase())
            .collect()
    }
}

fn ends_sentence(word: &str) -> bool {
    word.ends_with(['.', '!', '?'])
}

/// Insert a paragraph break wherever more than `max_words` words follow
/// each other without a sentence terminal. Text that needs no break is
/// returned untouched.
fn bound_sentence_runs(text: &str, max_words: usize) -> Cow<'_, str> {
    let too_long = text.split("\n\n").any(|para| {
        let mut run = 0;
        para.split_whitespace().any(|word| {
            run = if ends_sentence(word) { 0 } else { run + 1 };
            run > max_words
        })
    });
    if !too_long {
        return Cow::Borrowed(text);
    }

    let paragraphs: Vec<String> = text
        .split("\n\n")
        .map(|para| {
            let mut out = String::with_capacity(para.len() + 16);
            let mut run = 0;
            for word in para.split_whitespace() {
                if run == max_words {
                    out.push_str("\n\n");
                    run = 0;
                } else if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(word);
                run = if ends_sentence(word) { 0 } else { run + 1 };
            }
            out
        })
        .collect();
    Cow::Owned(paragraphs.join("\n\n"))
}
