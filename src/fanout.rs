//! Parallel fan-out of burstness computation across a feature set.
//!
//! Features are split into contiguous chunks, each chunk is packed with
//! its distributions into an owned [`WorkPackage`], and a fixed-size pool
//! of worker threads decodes the packages independently. The parent
//! blocks until every worker has finished, checks that each package's
//! output covers exactly its chunk, and merges the partial maps.
//!
//! ## Determinism
//!
//! Each feature is decoded by the same pure pipeline whichever worker
//! picks it up, and the merge is a union of disjoint `BTreeMap`s, so the
//! worker count never changes the result.

use std::collections::BTreeSet;
use std::ops::Range;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span};

use crate::burstness::{FeaturePipeline, SkippedFeature};
use crate::manifest::RunManifest;
use crate::policy::{BurstParams, BurstnessConfig, FeatureSelection, ParamsError};
use crate::sequence::time_zero;
use crate::store::FeatureCorpus;
use crate::types::{Date, FeatureBurstMap, FeatureId, OccurrenceDistribution};

/// Chunks above this size only log progress on every third feature.
const PROGRESS_EVERY_FEATURE_LIMIT: usize = 10;

/// Error type for burstness batches.
#[derive(Debug, thiserror::Error)]
pub enum BurstnessError {
    /// Invalid batch configuration.
    #[error("Invalid configuration: {0}")]
    Params(#[from] ParamsError),
    /// Corpus collaborator error.
    #[error("Corpus error: {0}")]
    Corpus(String),
    /// The corpus has no dates to anchor time zero on.
    #[error("Corpus date index is empty")]
    NoDateIndex,
    /// A worker's output does not cover its chunk exactly.
    #[error("Partition integrity failure in chunk {chunk}: {detail}")]
    PartitionIntegrity {
        /// Chunk index.
        chunk: usize,
        /// What was lost or duplicated.
        detail: String,
    },
    /// The OS refused to start a worker thread.
    #[error("Failed to spawn burst worker: {0}")]
    WorkerSpawn(String),
}

impl BurstnessError {
    /// Create a corpus error from any error type.
    pub fn from_corpus<E: std::error::Error>(e: E) -> Self {
        Self::Corpus(e.to_string())
    }
}

/// Result of a burstness batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurstnessRun {
    /// Burst series of every decodable feature.
    pub bursts: FeatureBurstMap,
    /// Features left out, sorted by feature.
    pub skipped: Vec<SkippedFeature>,
    /// Fingerprint of the batch.
    pub manifest: RunManifest,
}

/// Immutable input of one worker: a chunk of features with their
/// distributions and the shared decode settings.
#[derive(Debug, Clone)]
pub struct WorkPackage {
    /// Chunk index.
    pub index: usize,
    /// Synthetic time zero shared by the batch.
    pub time_zero: Date,
    /// Automaton parameters shared by the batch.
    pub params: BurstParams,
    /// The chunk's features, in input order.
    pub features: Vec<(FeatureId, OccurrenceDistribution)>,
}

impl WorkPackage {
    fn feature_ids(&self) -> Vec<FeatureId> {
        self.features.iter().map(|(f, _)| f.clone()).collect()
    }

    fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Output of one worker.
#[derive(Debug, Clone)]
pub struct WorkerOutput {
    /// Chunk index this output belongs to.
    pub index: usize,
    /// Series of the chunk's decodable features.
    pub bursts: FeatureBurstMap,
    /// The chunk's skipped features.
    pub skipped: Vec<SkippedFeature>,
}

/// Contiguous chunk ranges for `len` features over `workers` workers.
///
/// Chunk `i < workers` is `[i·c, (i+1)·c)` with `c = len / workers`; a
/// trailing chunk `[workers·c, len)` holds the remainder and may be empty.
/// The ranges are disjoint and cover `0..len`.
pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let chunk = len / workers;
    (0..=workers)
        .map(|i| {
            let start = (i * chunk).min(len);
            let end = if i == workers { len } else { ((i + 1) * chunk).min(len) };
            start..end
        })
        .collect()
}

/// Decode every feature of a package.
pub fn run_package(package: WorkPackage) -> Result<WorkerOutput, ParamsError> {
    let span = info_span!("burst_worker", chunk = package.index);
    let _enter = span.enter();

    let pipeline = FeaturePipeline::new(&package.params, package.time_zero)?;
    let total = package.features.len();
    let mut bursts = FeatureBurstMap::new();
    let mut skipped = Vec::new();

    for (done, (feature, distribution)) in package.features.iter().enumerate() {
        if total <= PROGRESS_EVERY_FEATURE_LIMIT || done % 3 == 0 {
            info!(chunk = package.index, done, total, "worker progress");
        }
        match pipeline.run(feature, distribution) {
            Ok(series) => {
                bursts.insert(feature.clone(), series);
            }
            Err(reason) => skipped.push(SkippedFeature {
                feature: feature.clone(),
                reason,
            }),
        }
    }

    Ok(WorkerOutput {
        index: package.index,
        bursts,
        skipped,
    })
}

/// Fixed-size worker pool for burstness packages.
#[derive(Debug, Clone, Copy)]
pub struct FanOut {
    workers: usize,
}

impl FanOut {
    /// Create a pool description with `workers` threads.
    pub fn new(workers: usize) -> Result<Self, ParamsError> {
        if workers < 1 {
            return Err(ParamsError::InvalidWorkers(workers));
        }
        Ok(Self { workers })
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Split features into packages, one per partition range.
    pub fn packages(
        &self,
        features: Vec<(FeatureId, OccurrenceDistribution)>,
        time_zero: Date,
        params: &BurstParams,
    ) -> Vec<WorkPackage> {
        if self.workers == 1 {
            return vec![WorkPackage {
                index: 0,
                time_zero,
                params: params.clone(),
                features,
            }];
        }

        let ranges = partition(features.len(), self.workers);
        let non_empty = ranges.iter().filter(|r| !r.is_empty()).count();
        info!(features = features.len(), chunks = ranges.len(), non_empty, "partitioned features");

        let mut remaining = features.into_iter();
        ranges
            .into_iter()
            .enumerate()
            .map(|(index, range)| WorkPackage {
                index,
                time_zero,
                params: params.clone(),
                features: remaining.by_ref().take(range.len()).collect(),
            })
            .collect()
    }

    /// Run every package and merge the outputs.
    ///
    /// With one worker the packages run on the calling thread. Empty
    /// packages are never dispatched.
    pub fn run(
        &self,
        packages: Vec<WorkPackage>,
    ) -> Result<(FeatureBurstMap, Vec<SkippedFeature>), BurstnessError> {
        let expected: Vec<Vec<FeatureId>> = packages.iter().map(WorkPackage::feature_ids).collect();

        let (work, empty): (Vec<_>, Vec<_>) = packages.into_iter().partition(|p| !p.is_empty());
        let mut outputs: Vec<WorkerOutput> = empty
            .into_iter()
            .map(|package| WorkerOutput {
                index: package.index,
                bursts: FeatureBurstMap::new(),
                skipped: Vec::new(),
            })
            .collect();

        if self.workers == 1 {
            info!("single worker, running sequentially");
            for package in work {
                outputs.push(run_package(package)?);
            }
        } else {
            outputs.extend(self.run_pool(work)?);
        }

        merge(expected, outputs)
    }

    fn run_pool(&self, packages: Vec<WorkPackage>) -> Result<Vec<WorkerOutput>, BurstnessError> {
        let threads = self.workers.min(packages.len());
        if threads == 0 {
            return Ok(Vec::new());
        }
        info!(workers = threads, packages = packages.len(), "starting worker pool");

        let (job_tx, job_rx) = unbounded::<WorkPackage>();
        let (out_tx, out_rx) = unbounded::<Result<WorkerOutput, ParamsError>>();
        let dispatch = tracing::dispatcher::get_default(|d| d.clone());

        let mut handles = Vec::with_capacity(threads);
        let mut spawn_error = None;
        for idx in 0..threads {
            let job_rx = job_rx.clone();
            let out_tx = out_tx.clone();
            let dispatch = dispatch.clone();
            let spawned = thread::Builder::new()
                .name(format!("burst-worker-{idx}"))
                .spawn(move || {
                    tracing::dispatcher::with_default(&dispatch, || worker_loop(job_rx, out_tx))
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    error!(worker = idx, error = %e, "failed to spawn burst worker");
                    spawn_error = Some(BurstnessError::WorkerSpawn(e.to_string()));
                    break;
                }
            }
        }
        drop(job_rx);
        drop(out_tx);

        if spawn_error.is_none() {
            for package in packages {
                // Receivers only go away if every worker died; the integrity
                // check reports the missing chunks.
                if job_tx.send(package).is_err() {
                    break;
                }
            }
        }
        drop(job_tx);

        let mut panicked = 0;
        for handle in handles {
            if handle.join().is_err() {
                panicked += 1;
            }
        }
        if panicked > 0 {
            error!(panicked, "worker threads panicked");
        }
        if let Some(e) = spawn_error {
            return Err(e);
        }

        out_rx
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(BurstnessError::from)
    }
}

/// Pull packages until the job channel closes.
fn worker_loop(jobs: Receiver<WorkPackage>, results: Sender<Result<WorkerOutput, ParamsError>>) {
    for package in jobs {
        if results.send(run_package(package)).is_err() {
            break;
        }
    }
}

/// Check every chunk came back exactly once and covers its features, then
/// union the partial results.
fn merge(
    expected: Vec<Vec<FeatureId>>,
    outputs: Vec<WorkerOutput>,
) -> Result<(FeatureBurstMap, Vec<SkippedFeature>), BurstnessError> {
    let mut slots: Vec<Option<WorkerOutput>> = (0..expected.len()).map(|_| None).collect();
    for output in outputs {
        let index = output.index;
        let Some(slot) = slots.get_mut(index) else {
            return Err(integrity(index, "unknown chunk".to_string()));
        };
        if slot.is_some() {
            return Err(integrity(index, "chunk returned twice".to_string()));
        }
        *slot = Some(output);
    }

    let mut bursts = FeatureBurstMap::new();
    let mut skipped = Vec::new();

    for (index, (features, slot)) in expected.into_iter().zip(slots).enumerate() {
        let output = slot.ok_or_else(|| integrity(index, "no result returned".to_string()))?;

        let expected: BTreeSet<FeatureId> = features.into_iter().collect();
        let mut returned: BTreeSet<FeatureId> = output.bursts.features().cloned().collect();
        for s in &output.skipped {
            if !returned.insert(s.feature.clone()) {
                return Err(integrity(index, format!("feature {} reported twice", s.feature)));
            }
        }
        if returned != expected {
            let missing = expected.difference(&returned).count();
            let extra = returned.difference(&expected).count();
            return Err(integrity(
                index,
                format!("{missing} features missing, {extra} unexpected"),
            ));
        }

        debug!(chunk = index, decoded = output.bursts.len(), skipped = output.skipped.len(), "merging chunk");
        bursts
            .union(output.bursts)
            .map_err(|dup| integrity(index, format!("feature {dup} decoded by two chunks")))?;
        skipped.extend(output.skipped);
    }

    skipped.sort_by(|a, b| a.feature.cmp(&b.feature));
    Ok((bursts, skipped))
}

fn integrity(chunk: usize, detail: String) -> BurstnessError {
    error!(chunk, %detail, "partition integrity failure");
    BurstnessError::PartitionIntegrity { chunk, detail }
}

/// Drop repeated features, keeping the first occurrence.
fn dedup_features(features: Vec<FeatureId>) -> Vec<FeatureId> {
    let mut seen = BTreeSet::new();
    features.into_iter().filter(|f| seen.insert(f.clone())).collect()
}

/// Estimate burst series for a set of features in `featureset`.
///
/// Features come from the configured selection: an explicit list, or the
/// corpus' top features. Features that cannot be decoded are listed in
/// `skipped` and absent from `bursts`.
pub fn burstness<C: FeatureCorpus>(
    corpus: &C,
    featureset: &str,
    config: &BurstnessConfig,
) -> Result<BurstnessRun, BurstnessError> {
    config.validate()?;
    let fanout = FanOut::new(config.workers)?;

    let features = match &config.selection {
        FeatureSelection::Explicit(features) => dedup_features(features.clone()),
        FeatureSelection::Top { topn, perslice } => dedup_features(
            corpus
                .top_features(featureset, *topn, *perslice)
                .map_err(BurstnessError::from_corpus)?
                .into_features(),
        ),
    };
    let requested = features.len();
    info!(featureset, features = requested, workers = config.workers, "burstness batch");

    let (bursts, skipped) = if features.is_empty() {
        (FeatureBurstMap::new(), Vec::new())
    } else {
        let min_date = corpus
            .min_date()
            .map_err(BurstnessError::from_corpus)?
            .ok_or(BurstnessError::NoDateIndex)?;

        let distributions = features
            .into_iter()
            .map(|feature| {
                corpus
                    .feature_distribution(featureset, &feature)
                    .map(|dist| (feature, dist))
                    .map_err(BurstnessError::from_corpus)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let packages = fanout.packages(distributions, time_zero(min_date), &config.params);
        fanout.run(packages)?
    };

    let manifest = RunManifest::new(featureset, config, requested, &bursts, &skipped);
    info!(
        decoded = manifest.decoded_features,
        skipped = manifest.skipped_features,
        result_hash = %manifest.result_hash,
        "burstness batch complete"
    );

    Ok(BurstnessRun {
        bursts,
        skipped,
        manifest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCorpus;

    fn dist(pairs: &[(Date, u64)]) -> OccurrenceDistribution {
        OccurrenceDistribution::new(pairs.to_vec())
    }

    fn make_corpus(n: usize) -> (InMemoryCorpus, Vec<FeatureId>) {
        let mut corpus = InMemoryCorpus::new();
        let mut features = Vec::new();
        for i in 0..n {
            let id = FeatureId::new(format!("f{i:03}"));
            let burst = (i % 7) as u64 * 3;
            let pairs = vec![
                (1990 + (i % 3) as Date, 1),
                (1995, burst),
                (1996, (i % 2) as u64),
                (2005, 1),
            ];
            corpus.add_feature("terms", id.clone(), dist(&pairs));
            features.push(id);
        }
        (corpus, features)
    }

    #[test]
    fn test_partition_covers_everything() {
        for len in 0..40 {
            for workers in 1..9 {
                let ranges = partition(len, workers);
                assert_eq!(ranges.len(), workers + 1);
                let mut next = 0;
                for r in &ranges {
                    assert_eq!(r.start, next, "len={len} workers={workers}");
                    next = r.end;
                }
                assert_eq!(next, len);
            }
        }
    }

    #[test]
    fn test_partition_trailing_chunk() {
        assert_eq!(partition(10, 4), vec![0..2, 2..4, 4..6, 6..8, 8..10]);
        assert_eq!(partition(8, 4), vec![0..2, 2..4, 4..6, 6..8, 8..8]);
        assert_eq!(partition(3, 4), vec![0..0, 0..0, 0..0, 0..0, 0..3]);
    }

    #[test]
    fn test_worker_counts_agree() {
        let (corpus, features) = make_corpus(23);
        let sequential = burstness(&corpus, "terms", &BurstnessConfig::for_features(features.clone()).with_workers(1)).unwrap();

        for workers in [2, 4, 7, 30] {
            let config = BurstnessConfig::for_features(features.clone()).with_workers(workers);
            let parallel = burstness(&corpus, "terms", &config).unwrap();
            assert_eq!(parallel.bursts, sequential.bursts, "workers={workers}");
            assert_eq!(parallel.skipped, sequential.skipped);
            assert_eq!(parallel.manifest.result_hash, sequential.manifest.result_hash);
        }
    }

    #[test]
    fn test_workers_far_exceed_features() {
        let (corpus, features) = make_corpus(3);
        let sequential = burstness(&corpus, "terms", &BurstnessConfig::for_features(features.clone()).with_workers(1)).unwrap();

        let config = BurstnessConfig::for_features(features).with_workers(200_000);
        let parallel = burstness(&corpus, "terms", &config).unwrap();
        assert_eq!(parallel.bursts, sequential.bursts);
        assert_eq!(parallel.manifest.result_hash, sequential.manifest.result_hash);
        assert_eq!(parallel.manifest.worker_count, 200_000);
    }

    #[test]
    fn test_empty_packages_need_no_threads() {
        let fanout = FanOut::new(4).unwrap();
        let packages = fanout.packages(Vec::new(), 1989, &BurstParams::default());
        assert_eq!(packages.len(), 5);
        assert!(packages.iter().all(WorkPackage::is_empty));

        let (bursts, skipped) = fanout.run(packages).unwrap();
        assert!(bursts.is_empty());
        assert!(skipped.is_empty());
    }

    #[test]
    fn test_skipped_features_reported() {
        let (mut corpus, mut features) = make_corpus(4);
        corpus.add_feature("terms", "silent", dist(&[(1995, 0)]));
        features.push(FeatureId::from("silent"));
        features.push(FeatureId::from("absent"));

        let run = burstness(&corpus, "terms", &BurstnessConfig::for_features(features).with_workers(3)).unwrap();
        assert_eq!(run.bursts.len(), 4);
        let skipped: Vec<_> = run.skipped.iter().map(|s| s.feature.as_str()).collect();
        assert_eq!(skipped, vec!["absent", "silent"]);
        assert!(!run.bursts.contains(&FeatureId::from("silent")));
    }

    #[test]
    fn test_duplicate_features_decoded_once() {
        let (corpus, features) = make_corpus(3);
        let mut doubled = features.clone();
        doubled.extend(features);

        let run = burstness(&corpus, "terms", &BurstnessConfig::for_features(doubled).with_workers(2)).unwrap();
        assert_eq!(run.bursts.len(), 3);
        assert_eq!(run.manifest.requested_features, 3);
    }

    #[test]
    fn test_top_feature_selection() {
        let (corpus, _) = make_corpus(12);
        let config = BurstnessConfig {
            selection: FeatureSelection::Top { topn: crate::policy::TopN::Count(5), perslice: false },
            ..BurstnessConfig::default()
        };
        let run = burstness(&corpus, "terms", &config).unwrap();
        assert_eq!(run.bursts.len() + run.skipped.len(), 5);
    }

    #[test]
    fn test_empty_date_index() {
        let mut corpus = InMemoryCorpus::new();
        corpus.add_feature("terms", "x", OccurrenceDistribution::default());
        let err = burstness(&corpus, "terms", &BurstnessConfig::for_features(["x"])).unwrap_err();
        assert!(matches!(err, BurstnessError::NoDateIndex));

        // Nothing requested, nothing to anchor.
        let run = burstness(&corpus, "terms", &BurstnessConfig::for_features(Vec::<FeatureId>::new())).unwrap();
        assert!(run.bursts.is_empty());
        assert_eq!(run.manifest.requested_features, 0);
    }

    #[test]
    fn test_corpus_errors_propagate() {
        let (corpus, features) = make_corpus(2);
        let err = burstness(&corpus, "authors", &BurstnessConfig::for_features(features)).unwrap_err();
        assert!(matches!(err, BurstnessError::Corpus(_)));
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let (corpus, features) = make_corpus(2);
        let config = BurstnessConfig::for_features(features).with_params(BurstParams::new(5, 1.0, 1.0, true));
        assert!(matches!(
            burstness(&corpus, "terms", &config),
            Err(BurstnessError::Params(ParamsError::InvalidScale(_)))
        ));
    }

    #[test]
    fn test_merge_detects_lost_chunk() {
        let (_, features) = make_corpus(4);
        let expected = vec![features[..2].to_vec(), features[2..].to_vec()];
        let outputs = vec![WorkerOutput {
            index: 0,
            bursts: FeatureBurstMap::new(),
            skipped: features[..2]
                .iter()
                .map(|f| SkippedFeature {
                    feature: f.clone(),
                    reason: crate::burstness::FeatureFailure::DecodeFailure { t: 1 },
                })
                .collect(),
        }];

        let err = merge(expected, outputs).unwrap_err();
        assert!(matches!(err, BurstnessError::PartitionIntegrity { chunk: 1, .. }));
    }

    #[test]
    fn test_merge_detects_dropped_feature() {
        let (_, features) = make_corpus(2);
        let expected = vec![features.clone()];
        let outputs = vec![WorkerOutput {
            index: 0,
            bursts: FeatureBurstMap::new(),
            skipped: vec![SkippedFeature {
                feature: features[0].clone(),
                reason: crate::burstness::FeatureFailure::DecodeFailure { t: 1 },
            }],
        }];

        let err = merge(expected, outputs).unwrap_err();
        match err {
            BurstnessError::PartitionIntegrity { chunk, detail } => {
                assert_eq!(chunk, 0);
                assert!(detail.contains("1 features missing"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
