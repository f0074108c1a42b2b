//! Collaborator interfaces: the corpus and the time-sliced graph collection.
//!
//! The kernel never parses corpora or computes centrality itself. It
//! consumes these two traits and returns in-memory results.

pub mod memory;

use std::collections::{BTreeMap, BTreeSet};

use crate::policy::TopN;
use crate::types::{Date, FeatureId, OccurrenceDistribution};

/// Integer index of a node in a graph collection.
pub type NodeIndex = usize;

/// Ranked features as reported by the corpus.
#[derive(Debug, Clone, PartialEq)]
pub enum RankedFeatures {
    /// One ranking over the whole corpus.
    Overall(Vec<FeatureId>),
    /// One ranking per date slice.
    PerSlice(BTreeMap<Date, Vec<FeatureId>>),
}

impl RankedFeatures {
    /// Flatten into a feature list.
    ///
    /// Per-slice rankings are merged and sorted by feature id so the
    /// result does not depend on slice iteration order.
    pub fn into_features(self) -> Vec<FeatureId> {
        match self {
            Self::Overall(features) => features,
            Self::PerSlice(slices) => slices
                .into_values()
                .flatten()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        }
    }
}

/// Source of per-feature occurrence distributions.
///
/// Implementations must return distributions with non-decreasing dates.
pub trait FeatureCorpus {
    /// Error type for corpus lookups.
    type Error: std::error::Error + Send + Sync;

    /// Occurrence counts of `feature` by date.
    fn feature_distribution(
        &self,
        featureset: &str,
        feature: &FeatureId,
    ) -> Result<OccurrenceDistribution, Self::Error>;

    /// Earliest date in the corpus date index, if the index has any dates.
    fn min_date(&self) -> Result<Option<Date>, Self::Error>;

    /// Highest-count features of a featureset.
    fn top_features(
        &self,
        featureset: &str,
        topn: TopN,
        perslice: bool,
    ) -> Result<RankedFeatures, Self::Error>;
}

/// A collection of graphs keyed by time slice.
///
/// Every node has a global integer index shared across slices; the node's
/// label is the feature it stands for.
pub trait GraphCollection {
    /// Error type for collection access.
    type Error: std::error::Error + Send + Sync;

    /// Slice keys in ascending order.
    fn slice_keys(&self) -> Vec<Date>;

    /// Nodes present in a slice.
    fn slice_nodes(&self, key: Date) -> Result<BTreeSet<NodeIndex>, Self::Error>;

    /// Betweenness centrality of the nodes in a slice.
    fn centrality(&self, key: Date) -> Result<BTreeMap<NodeIndex, f64>, Self::Error>;

    /// Labels of every node in the collection, in index order.
    fn node_features(&self) -> Vec<FeatureId>;

    /// Global index of the node labelled `feature`.
    fn node_index(&self, feature: &FeatureId) -> Option<NodeIndex>;

    /// Set a node attribute on one slice's graph.
    fn set_slice_attribute(
        &mut self,
        key: Date,
        attribute: &str,
        values: &BTreeMap<NodeIndex, f64>,
    ) -> Result<(), Self::Error>;

    /// Set a per-node `slice → value` attribute on the master view.
    fn set_master_attribute(
        &mut self,
        attribute: &str,
        values: &BTreeMap<NodeIndex, BTreeMap<Date, f64>>,
    ) -> Result<(), Self::Error>;

    /// Values of a node attribute across slices, by slice key.
    fn node_history(&self, node: NodeIndex, attribute: &str) -> Result<BTreeMap<Date, f64>, Self::Error>;
}

pub use memory::{InMemoryCorpus, InMemoryGraphCollection, InMemoryError};
