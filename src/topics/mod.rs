// Topic extraction — TF-IDF vectors, cluster labels and sentiment lexicons.

pub mod keywords;
pub mod labeler;
pub mod lexicon;
pub mod tfidf;
pub mod traits;

pub use keywords::YakeExtractor;
pub use labeler::{label_topics, TopicLabels, UNCLUSTERED};
pub use lexicon::{Lexicon, LexiconConfig, LexiconEntry, LexiconExtractor, RatedText};
pub use tfidf::{TermMatrix, TfIdfVectorizer, VectorizerConfig};
pub use traits::KeywordExtractor;
