// Topic labeler — one keyword per cluster.
//
// Member texts of each cluster are joined one paragraph per review and the
// single best keyword becomes the topic. Noise never goes through extraction.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use tracing::{info, warn};

use super::traits::KeywordExtractor;
use crate::clustering::NOISE;
use crate::error::{PipelineError, PipelineResult, PipelineWarning};

/// Topic of the noise cluster.
pub const UNCLUSTERED: &str = "unclustered";

/// Paragraph break between member texts, so no review runs into the next.
const MEMBER_SEPARATOR: &str = "\n\n";

/// Cluster id to topic, built once per file.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicLabels {
    pub topics: BTreeMap<i32, String>,
    pub warnings: Vec<PipelineWarning>,
}

impl TopicLabels {
    /// Topic for a cluster id; ids never seen map to the noise topic.
    pub fn topic_for(&self, cluster: i32) -> &str {
        self.topics
            .get(&cluster)
            .map_or(UNCLUSTERED, String::as_str)
    }

    /// Per-document topic column.
    pub fn assign(&self, labels: &[i32]) -> Vec<String> {
        labels.iter().map(|&c| self.topic_for(c).to_string()).collect()
    }
}

/// Best single keyword for one cluster's concatenated text.
pub fn label_cluster(
    cluster: i32,
    text: &str,
    extractor: &dyn KeywordExtractor,
) -> PipelineResult<String> {
    extractor
        .extract(text, 1)
        .into_iter()
        .next()
        .filter(|kw| !kw.is_empty())
        .ok_or(PipelineError::EmptyClusterText { cluster })
}

/// Label every cluster in `labels`. A cluster whose text yields no keyword
/// is labeled with its own id and reported as a warning.
pub fn label_topics<S: AsRef<str> + Sync>(
    texts: &[S],
    labels: &[i32],
    extractor: &dyn KeywordExtractor,
) -> TopicLabels {
    let clusters: BTreeSet<i32> = labels.iter().copied().filter(|&c| c != NOISE).collect();

    let labeled: Vec<(i32, PipelineResult<String>)> = clusters
        .par_iter()
        .map(|&cluster| {
            let text = texts
                .iter()
                .zip(labels)
                .filter(|&(_, &l)| l == cluster)
                .map(|(t, _)| t.as_ref())
                .collect::<Vec<_>>()
                .join(MEMBER_SEPARATOR);
            (cluster, label_cluster(cluster, &text, extractor))
        })
        .collect();

    let mut topics = BTreeMap::new();
    let mut warnings = Vec::new();
    topics.insert(NOISE, UNCLUSTERED.to_string());
    for (cluster, result) in labeled {
        let topic = match result {
            Ok(topic) => topic,
            Err(e) => {
                let placeholder = cluster.to_string();
                warn!(cluster, error = %e, "Falling back to placeholder topic");
                warnings.push(PipelineWarning::PlaceholderTopic {
                    cluster,
                    placeholder: placeholder.clone(),
                });
                placeholder
            }
        };
        topics.insert(cluster, topic);
    }

    info!(topics = clusters.len(), "Cluster topics labeled");
    TopicLabels { topics, warnings }
}
