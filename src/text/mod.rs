// Text plumbing shared by the vectorizer, topic labeler and lexicon extractor.

pub mod stopwords;

/// Split text into lowercase word tokens of two or more characters.
///
/// A token is a maximal run of alphanumerics or underscores, so punctuation,
/// whitespace and markup all act as separators.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().nth(1).is_some())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_drops_short_tokens() {
        let tokens: Vec<String> = tokenize("A Great kettle, it's GREAT!").collect();
        assert_eq!(tokens, vec!["great", "kettle", "it", "great"]);
    }

    #[test]
    fn test_tokenize_handles_markup_and_digits() {
        let tokens: Vec<String> = tokenize("4<br />stars, 10/10 would_buy").collect();
        assert_eq!(tokens, vec!["br", "stars", "10", "10", "would_buy"]);
    }
}
