//! In-memory corpus and graph collection for testing.

use std::collections::{BTreeMap, BTreeSet};

use crate::policy::TopN;
use crate::types::{Date, FeatureId, OccurrenceDistribution};
use super::{FeatureCorpus, GraphCollection, NodeIndex, RankedFeatures};

/// Error type for in-memory collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InMemoryError {
    /// Featureset not indexed.
    #[error("Featureset not found: {0}")]
    FeaturesetNotFound(String),
    /// Slice key not in the collection.
    #[error("Slice not found: {0}")]
    SliceNotFound(Date),
    /// Node index not in the collection.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeIndex),
}

/// In-memory corpus for testing.
///
/// Uses BTreeMap/BTreeSet for deterministic iteration order. Adding a
/// feature also records its dates in the date index.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCorpus {
    /// Featureset name -> feature -> distribution.
    featuresets: BTreeMap<String, BTreeMap<FeatureId, OccurrenceDistribution>>,
    /// All dates present in the corpus.
    dates: BTreeSet<Date>,
}

impl InMemoryCorpus {
    /// Create a new empty corpus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a feature's distribution, replacing any previous one.
    pub fn add_feature(
        &mut self,
        featureset: &str,
        feature: impl Into<FeatureId>,
        distribution: OccurrenceDistribution,
    ) {
        self.dates.extend(distribution.entries().iter().map(|(d, _)| *d));
        self.featuresets
            .entry(featureset.to_string())
            .or_default()
            .insert(feature.into(), distribution);
    }

    /// Record dates with no feature occurrences (e.g. documents without
    /// the indexed featureset).
    pub fn add_dates(&mut self, dates: impl IntoIterator<Item = Date>) {
        self.dates.extend(dates);
    }

    /// Number of features in a featureset.
    pub fn num_features(&self, featureset: &str) -> usize {
        self.featuresets.get(featureset).map_or(0, BTreeMap::len)
    }

    fn featureset(&self, featureset: &str) -> Result<&BTreeMap<FeatureId, OccurrenceDistribution>, InMemoryError> {
        self.featuresets
            .get(featureset)
            .ok_or_else(|| InMemoryError::FeaturesetNotFound(featureset.to_string()))
    }
}

/// Rank `(feature, count)` pairs by count descending, then by feature.
fn rank(mut counts: Vec<(FeatureId, u64)>, topn: TopN) -> Vec<FeatureId> {
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let take = topn.resolve(counts.len());
    counts.into_iter().take(take).map(|(f, _)| f).collect()
}

impl FeatureCorpus for InMemoryCorpus {
    type Error = InMemoryError;

    fn feature_distribution(
        &self,
        featureset: &str,
        feature: &FeatureId,
    ) -> Result<OccurrenceDistribution, Self::Error> {
        Ok(self
            .featureset(featureset)?
            .get(feature)
            .cloned()
            .unwrap_or_default())
    }

    fn min_date(&self) -> Result<Option<Date>, Self::Error> {
        Ok(self.dates.first().copied())
    }

    fn top_features(
        &self,
        featureset: &str,
        topn: TopN,
        perslice: bool,
    ) -> Result<RankedFeatures, Self::Error> {
        let features = self.featureset(featureset)?;

        if !perslice {
            let counts = features
                .iter()
                .map(|(f, dist)| (f.clone(), dist.total()))
                .filter(|(_, n)| *n > 0)
                .collect();
            return Ok(RankedFeatures::Overall(rank(counts, topn)));
        }

        let mut per_date: BTreeMap<Date, Vec<(FeatureId, u64)>> = BTreeMap::new();
        for (feature, dist) in features {
            for &(date, count) in dist.entries() {
                if count > 0 {
                    per_date.entry(date).or_default().push((feature.clone(), count));
                }
            }
        }
        Ok(RankedFeatures::PerSlice(
            per_date
                .into_iter()
                .map(|(date, counts)| (date, rank(counts, topn)))
                .collect(),
        ))
    }
}

/// One time slice of an in-memory graph collection.
#[derive(Debug, Clone, Default)]
struct SliceGraph {
    /// Node -> betweenness centrality; keys are the slice's node set.
    centrality: BTreeMap<NodeIndex, f64>,
    /// Attribute name -> node -> value.
    attributes: BTreeMap<String, BTreeMap<NodeIndex, f64>>,
}

/// In-memory time-sliced graph collection for testing.
///
/// Centrality is supplied by the caller per slice; no graph algorithm
/// runs here.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraphCollection {
    /// Node labels by index.
    labels: Vec<FeatureId>,
    /// Label -> index.
    lookup: BTreeMap<FeatureId, NodeIndex>,
    /// Slice key -> slice graph.
    slices: BTreeMap<Date, SliceGraph>,
    /// Attribute name -> node -> slice key -> value.
    master: BTreeMap<String, BTreeMap<NodeIndex, BTreeMap<Date, f64>>>,
}

impl InMemoryGraphCollection {
    /// Create a new empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the node labelled `feature`, adding it if needed.
    pub fn add_node(&mut self, feature: impl Into<FeatureId>) -> NodeIndex {
        let feature = feature.into();
        if let Some(&idx) = self.lookup.get(&feature) {
            return idx;
        }
        let idx = self.labels.len();
        self.labels.push(feature.clone());
        self.lookup.insert(feature, idx);
        idx
    }

    /// Add (or replace) a slice with its nodes and their centrality.
    pub fn add_slice<I, F>(&mut self, key: Date, nodes: I)
    where
        I: IntoIterator<Item = (F, f64)>,
        F: Into<FeatureId>,
    {
        let centrality = nodes
            .into_iter()
            .map(|(feature, c)| (self.add_node(feature), c))
            .collect();
        self.slices.insert(
            key,
            SliceGraph {
                centrality,
                attributes: BTreeMap::new(),
            },
        );
    }

    /// Number of nodes across all slices.
    pub fn num_nodes(&self) -> usize {
        self.labels.len()
    }

    /// Value of a node attribute on one slice's graph.
    pub fn slice_attribute(&self, key: Date, attribute: &str, node: NodeIndex) -> Option<f64> {
        self.slices.get(&key)?.attributes.get(attribute)?.get(&node).copied()
    }

    /// Per-slice history stored for a node on the master view.
    pub fn master_attribute(&self, attribute: &str, node: NodeIndex) -> Option<&BTreeMap<Date, f64>> {
        self.master.get(attribute)?.get(&node)
    }

    fn slice(&self, key: Date) -> Result<&SliceGraph, InMemoryError> {
        self.slices.get(&key).ok_or(InMemoryError::SliceNotFound(key))
    }
}

impl GraphCollection for InMemoryGraphCollection {
    type Error = InMemoryError;

    fn slice_keys(&self) -> Vec<Date> {
        self.slices.keys().copied().collect()
    }

    fn slice_nodes(&self, key: Date) -> Result<BTreeSet<NodeIndex>, Self::Error> {
        Ok(self.slice(key)?.centrality.keys().copied().collect())
    }

    fn centrality(&self, key: Date) -> Result<BTreeMap<NodeIndex, f64>, Self::Error> {
        Ok(self.slice(key)?.centrality.clone())
    }

    fn node_features(&self) -> Vec<FeatureId> {
        self.labels.clone()
    }

    fn node_index(&self, feature: &FeatureId) -> Option<NodeIndex> {
        self.lookup.get(feature).copied()
    }

    fn set_slice_attribute(
        &mut self,
        key: Date,
        attribute: &str,
        values: &BTreeMap<NodeIndex, f64>,
    ) -> Result<(), Self::Error> {
        let slice = self.slices.get_mut(&key).ok_or(InMemoryError::SliceNotFound(key))?;
        let column = slice.attributes.entry(attribute.to_string()).or_default();
        column.extend(values.iter().map(|(n, v)| (*n, *v)));
        Ok(())
    }

    fn set_master_attribute(
        &mut self,
        attribute: &str,
        values: &BTreeMap<NodeIndex, BTreeMap<Date, f64>>,
    ) -> Result<(), Self::Error> {
        if let Some(node) = values.keys().find(|n| **n >= self.labels.len()) {
            return Err(InMemoryError::NodeNotFound(*node));
        }
        let column = self.master.entry(attribute.to_string()).or_default();
        for (node, history) in values {
            column.insert(*node, history.clone());
        }
        Ok(())
    }

    fn node_history(&self, node: NodeIndex, attribute: &str) -> Result<BTreeMap<Date, f64>, Self::Error> {
        if node >= self.labels.len() {
            return Err(InMemoryError::NodeNotFound(node));
        }
        Ok(self
            .slices
            .iter()
            .filter_map(|(key, slice)| {
                slice
                    .attributes
                    .get(attribute)
                    .and_then(|column| column.get(&node))
                    .map(|v| (*key, *v))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> InMemoryCorpus {
        let mut corpus = InMemoryCorpus::new();
        corpus.add_feature("terms", "process", OccurrenceDistribution::new(vec![(1990, 2), (1991, 3)]));
        corpus.add_feature("terms", "method", OccurrenceDistribution::new(vec![(1991, 4)]));
        corpus.add_feature("terms", "theory", OccurrenceDistribution::new(vec![(1992, 1)]));
        corpus.add_feature("terms", "unused", OccurrenceDistribution::new(vec![(1993, 0)]));
        corpus.add_dates([1985]);
        corpus
    }

    #[test]
    fn test_min_date_includes_bare_dates() {
        assert_eq!(corpus().min_date().unwrap(), Some(1985));
        assert_eq!(InMemoryCorpus::new().min_date().unwrap(), None);
    }

    #[test]
    fn test_unknown_feature_is_empty() {
        let dist = corpus().feature_distribution("terms", &FeatureId::from("missing")).unwrap();
        assert_eq!(dist.total(), 0);
        assert_eq!(
            corpus().feature_distribution("authors", &FeatureId::from("x")),
            Err(InMemoryError::FeaturesetNotFound("authors".to_string()))
        );
    }

    #[test]
    fn test_top_features_overall() {
        let ranked = corpus().top_features("terms", TopN::Count(2), false).unwrap();
        assert_eq!(
            ranked,
            RankedFeatures::Overall(vec![FeatureId::from("process"), FeatureId::from("method")])
        );

        let all = corpus().top_features("terms", TopN::Fraction(1.0), false).unwrap();
        assert_eq!(all.into_features().len(), 3);
    }

    #[test]
    fn test_top_features_per_slice() {
        let ranked = corpus().top_features("terms", TopN::Count(1), true).unwrap();
        match &ranked {
            RankedFeatures::PerSlice(slices) => {
                assert_eq!(slices[&1990], vec![FeatureId::from("process")]);
                assert_eq!(slices[&1991], vec![FeatureId::from("method")]);
                assert_eq!(slices[&1992], vec![FeatureId::from("theory")]);
            }
            other => panic!("expected per-slice ranking, got {other:?}"),
        }
        assert_eq!(
            ranked.into_features(),
            vec![FeatureId::from("method"), FeatureId::from("process"), FeatureId::from("theory")]
        );
    }

    #[test]
    fn test_graph_collection_attributes() {
        let mut graphs = InMemoryGraphCollection::new();
        graphs.add_slice(2001, [("a", 0.2), ("b", 0.0)]);
        graphs.add_slice(2002, [("a", 0.1)]);

        let a = graphs.node_index(&FeatureId::from("a")).unwrap();
        assert_eq!(graphs.slice_keys(), vec![2001, 2002]);
        assert_eq!(graphs.slice_nodes(2002).unwrap().len(), 1);
        assert_eq!(graphs.num_nodes(), 2);

        graphs.set_slice_attribute(2001, "sigma", &BTreeMap::from([(a, 0.5)])).unwrap();
        graphs.set_slice_attribute(2002, "sigma", &BTreeMap::from([(a, 0.7)])).unwrap();

        let history = graphs.node_history(a, "sigma").unwrap();
        assert_eq!(history, BTreeMap::from([(2001, 0.5), (2002, 0.7)]));
        assert_eq!(graphs.slice_attribute(2001, "sigma", a), Some(0.5));
        assert_eq!(
            graphs.set_slice_attribute(1999, "sigma", &BTreeMap::new()),
            Err(InMemoryError::SliceNotFound(1999))
        );
    }
}
