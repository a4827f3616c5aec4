// Keyword extractor trait — swap-ready abstraction.
//
// Topic labels and lexicon summaries both reduce a blob of text to a few
// ranked words. The default implementation is YAKE; tests substitute
// simpler extractors to pin down the surrounding logic.

/// Reduce a text to its most representative unigrams.
pub trait KeywordExtractor: Sync {
    /// Up to `top_k` keywords, best first, lower-cased. Empty when the text
    /// has nothing left after stop-word removal.
    fn extract(&self, text: &str, top_k: usize) -> Vec<String>;
}
