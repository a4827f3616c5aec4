// Unit tests for the projection stage through its public entry point.

use review_topics::deadline::Deadline;
use review_topics::embedding::{CsrMatrix, Metric, ProjectionConfig, UmapProjector, N_COMPONENTS};
use review_topics::error::PipelineError;
use review_topics::text::stopwords::StopWords;
use review_topics::topics::{TfIdfVectorizer, VectorizerConfig};

const GADGETS: [&str; 8] = [
    "battery", "charger", "cable", "screen", "volume", "button", "speaker", "remote",
];
const KITCHEN: [&str; 8] = [
    "kettle", "boil", "lid", "water", "spout", "handle", "steam", "toaster",
];

/// `per_group` documents drawn from each of two disjoint vocabularies.
fn two_topic_corpus(per_group: usize) -> Vec<String> {
    let mut docs = Vec::new();
    for words in [GADGETS, KITCHEN] {
        for i in 0..per_group {
            docs.push(format!(
                "{} {} {} {}",
                words[i % 8],
                words[(i * 3 + 1) % 8],
                words[(i * 5 + 2) % 8],
                words[(i / 8) % 8]
            ));
        }
    }
    docs
}

fn term_matrix(docs: &[String]) -> CsrMatrix {
    let stop = StopWords::english();
    let config = VectorizerConfig {
        min_df: 2,
        max_df: None,
    };
    TfIdfVectorizer::new(config, &stop)
        .fit_transform(docs)
        .unwrap()
        .matrix
}

fn config(n_neighbors: usize) -> ProjectionConfig {
    ProjectionConfig {
        n_neighbors,
        n_epochs: Some(100),
        ..ProjectionConfig::default()
    }
}

fn mean_distance(points: &[[f64; 2]], a: &[usize], b: &[usize]) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for &i in a {
        for &j in b {
            if i != j {
                let dx = points[i][0] - points[j][0];
                let dy = points[i][1] - points[j][1];
                total += (dx * dx + dy * dy).sqrt();
                count += 1;
            }
        }
    }
    total / count as f64
}

#[test]
fn lexical_groups_are_separated_in_the_layout() {
    let docs = two_topic_corpus(40);
    let matrix = term_matrix(&docs);
    let embedding = UmapProjector::new(config(10))
        .project(&matrix, &Deadline::unbounded())
        .unwrap();

    assert_eq!(embedding.len(), 80);
    assert_eq!(embedding.points()[0].len(), N_COMPONENTS);
    assert!(embedding.points().iter().flatten().all(|v| v.is_finite()));

    let gadgets: Vec<usize> = (0..40).collect();
    let kitchen: Vec<usize> = (40..80).collect();
    let within = (mean_distance(embedding.points(), &gadgets, &gadgets)
        + mean_distance(embedding.points(), &kitchen, &kitchen))
        / 2.0;
    let between = mean_distance(embedding.points(), &gadgets, &kitchen);
    assert!(within < between, "within {within}, between {between}");
}

#[test]
fn same_seed_same_coordinates_for_both_metrics() {
    let docs = two_topic_corpus(20);
    let matrix = term_matrix(&docs);
    for metric in [Metric::Hellinger, Metric::Cosine] {
        let cfg = ProjectionConfig {
            metric,
            ..config(8)
        };
        let a = UmapProjector::new(cfg.clone())
            .project(&matrix, &Deadline::unbounded())
            .unwrap();
        let b = UmapProjector::new(cfg)
            .project(&matrix, &Deadline::unbounded())
            .unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn three_documents_with_thirty_neighbors_is_a_projection_error() {
    let docs = two_topic_corpus(20);
    let matrix = term_matrix(&docs[..3].to_vec());
    let err = UmapProjector::new(ProjectionConfig::default())
        .project(&matrix, &Deadline::unbounded())
        .unwrap_err();
    assert!(matches!(err, PipelineError::Projection(_)));
}

#[test]
fn metric_names_parse_case_insensitively() {
    assert_eq!("Hellinger".parse::<Metric>().unwrap(), Metric::Hellinger);
    assert_eq!("COSINE".parse::<Metric>().unwrap(), Metric::Cosine);
    assert!("euclidean".parse::<Metric>().is_err());
}
