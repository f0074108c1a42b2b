//! Sigma: burst intensity combined with betweenness centrality.
//!
//! For a node present in a slice whose feature has a burst score at that
//! slice's date, `sigma = (centrality + 1)^burst − 1`. Values are written
//! onto each slice's graph and, as a per-node history, onto the master
//! view. Nodes absent from a slice get no value there.

use std::collections::BTreeMap;

use tracing::{debug, info, info_span};

use crate::fanout::{burstness, BurstnessError};
use crate::policy::BurstnessConfig;
use crate::store::{FeatureCorpus, GraphCollection, NodeIndex};
use crate::types::{Date, FeatureBurstMap, SigmaMap, SigmaSeries};

/// Node attribute sigma values are stored under.
pub const SIGMA_ATTRIBUTE: &str = "sigma";

/// Error type for sigma computation.
#[derive(Debug, thiserror::Error)]
pub enum SigmaError {
    /// Computing the missing burst map failed.
    #[error("Burstness failed: {0}")]
    Burstness(#[from] BurstnessError),
    /// Graph collection error.
    #[error("Graph collection error: {0}")]
    Graph(String),
}

impl SigmaError {
    /// Create a graph error from any error type.
    pub fn from_graph<E: std::error::Error>(e: E) -> Self {
        Self::Graph(e.to_string())
    }
}

/// Sigma of one node in one slice.
#[inline]
pub fn sigma_value(centrality: f64, burst: f64) -> f64 {
    (centrality + 1.0).powf(burst) - 1.0
}

/// Compute sigma for every node of `graphs`.
///
/// When `bursts` is `None`, burst series are first computed for the
/// collection's node labels with default decode parameters. Returns one
/// series per feature of the burst map; a feature with no node in the
/// collection gets an empty series.
pub fn sigma<G, C>(
    graphs: &mut G,
    corpus: &C,
    featureset: &str,
    bursts: Option<&FeatureBurstMap>,
) -> Result<SigmaMap, SigmaError>
where
    G: GraphCollection,
    C: FeatureCorpus,
{
    let span = info_span!("sigma", featureset);
    let _enter = span.enter();

    let computed;
    let bursts = match bursts {
        Some(bursts) => bursts,
        None => {
            info!("no burst map supplied, computing burstness for graph nodes");
            let config = BurstnessConfig::for_features(graphs.node_features());
            computed = burstness(corpus, featureset, &config)?.bursts;
            &computed
        }
    };

    let nodes: Vec<(NodeIndex, _)> = bursts
        .iter()
        .filter_map(|(feature, series)| graphs.node_index(feature).map(|n| (n, series)))
        .collect();

    let mut history: BTreeMap<NodeIndex, BTreeMap<Date, f64>> = BTreeMap::new();
    let keys = graphs.slice_keys();
    info!(slices = keys.len(), features = bursts.len(), "computing sigma");

    for key in keys {
        let present = graphs.slice_nodes(key).map_err(SigmaError::from_graph)?;
        let centrality = graphs.centrality(key).map_err(SigmaError::from_graph)?;

        let mut values = BTreeMap::new();
        for &(node, series) in &nodes {
            if !present.contains(&node) {
                continue;
            }
            let Some(burst) = series.get(key) else { continue };
            // A node without a centrality entry lies on no shortest path.
            let c = centrality.get(&node).copied().unwrap_or(0.0);
            let value = sigma_value(c, burst);
            values.insert(node, value);
            history.entry(node).or_default().insert(key, value);
        }

        debug!(slice = key, nodes = values.len(), "sigma slice");
        graphs
            .set_slice_attribute(key, SIGMA_ATTRIBUTE, &values)
            .map_err(SigmaError::from_graph)?;
    }

    graphs
        .set_master_attribute(SIGMA_ATTRIBUTE, &history)
        .map_err(SigmaError::from_graph)?;

    bursts
        .features()
        .map(|feature| {
            let series = match graphs.node_index(feature) {
                Some(node) => SigmaSeries::from_history(
                    graphs
                        .node_history(node, SIGMA_ATTRIBUTE)
                        .map_err(SigmaError::from_graph)?,
                ),
                None => SigmaSeries::default(),
            };
            Ok((feature.clone(), series))
        })
        .collect()
}
