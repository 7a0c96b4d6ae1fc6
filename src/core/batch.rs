//! Batch classification of many units.
//!
//! Every unit runs through load → extract → score. A failure at any stage,
//! including a panic inside a loader or adapter, is captured in that unit's
//! [`ClassificationResult`] and the batch moves on.
//!
//! Results come out of a lazy [`ResultStream`] in exactly the order the units
//! were given. With more than one worker, units are scored concurrently and a
//! reorder buffer holds finished results until every earlier unit has been
//! emitted. A shared cancel flag is checked between units; once it is set no
//! new unit is started and the stream ends after the results already finished
//! in order.

use crate::core::features::{ExtractionError, FeatureExtractor};
use crate::scoring::model::{Label, ScoringAdapter, ScoringError};
use crate::source::types::Unit;
use crate::source::workbook::{LoadError, SeriesLoader};
use crossbeam_channel::{bounded, Receiver};
use std::any::Any;
use std::collections::{BTreeMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Why a unit could not be classified.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitError {
    Load(LoadError),
    Extraction(ExtractionError),
    Scoring(ScoringError),
    /// A stage panicked; carries the panic message
    Panicked(String),
}

impl UnitError {
    /// Pipeline stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            UnitError::Load(_) => "load",
            UnitError::Extraction(_) => "extract",
            UnitError::Scoring(_) => "score",
            UnitError::Panicked(_) => "internal",
        }
    }
}

impl std::fmt::Display for UnitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitError::Load(e) => write!(f, "{e}"),
            UnitError::Extraction(e) => write!(f, "{e}"),
            UnitError::Scoring(e) => write!(f, "{e}"),
            UnitError::Panicked(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for UnitError {}

impl From<LoadError> for UnitError {
    fn from(e: LoadError) -> Self {
        UnitError::Load(e)
    }
}

impl From<ExtractionError> for UnitError {
    fn from(e: ExtractionError) -> Self {
        UnitError::Extraction(e)
    }
}

impl From<ScoringError> for UnitError {
    fn from(e: ScoringError) -> Self {
        UnitError::Scoring(e)
    }
}

/// Either a label or an error, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Label(Label),
    Error(UnitError),
}

/// Three-way severity used by result sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Normal,
    Fault,
    Error,
}

/// Result for one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub unit_id: String,
    pub outcome: Outcome,
}

impl ClassificationResult {
    pub fn label(&self) -> Option<Label> {
        match &self.outcome {
            Outcome::Label(l) => Some(*l),
            Outcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&UnitError> {
        match &self.outcome {
            Outcome::Label(_) => None,
            Outcome::Error(e) => Some(e),
        }
    }

    pub fn severity(&self) -> Severity {
        match &self.outcome {
            Outcome::Label(Label::Normal) => Severity::Normal,
            Outcome::Label(Label::Fault) => Severity::Fault,
            Outcome::Error(_) => Severity::Error,
        }
    }
}

/// Renders as `<unit_id> -> NORMAL`, `-> FAULT` or `-> ERROR: <message>`.
impl std::fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            Outcome::Label(label) => write!(f, "{} -> {label}", self.unit_id),
            Outcome::Error(e) => write!(f, "{} -> ERROR: {e}", self.unit_id),
        }
    }
}

/// What `classify_all` produced.
pub enum BatchOutcome {
    /// There was nothing to classify.
    NoUnits,
    /// Results for the given units, in order.
    Results(ResultStream),
}

/// Loader, extractor and adapter bundled for one unit at a time.
struct Pipeline {
    loader: Arc<dyn SeriesLoader>,
    extractor: FeatureExtractor,
    adapter: Arc<dyn ScoringAdapter>,
}

impl Pipeline {
    fn run(&self, unit: &Unit) -> ClassificationResult {
        let evaluated =
            panic::catch_unwind(AssertUnwindSafe(|| self.evaluate(unit))).unwrap_or_else(|payload| {
                Err(UnitError::Panicked(panic_message(payload.as_ref())))
            });

        let outcome = match evaluated {
            Ok(label) => {
                tracing::debug!(unit = %unit.id, %label, "unit classified");
                Outcome::Label(label)
            }
            Err(e) => {
                tracing::warn!(unit = %unit.id, stage = e.stage(), error = %e, "unit failed");
                Outcome::Error(e)
            }
        };
        ClassificationResult {
            unit_id: unit.id.clone(),
            outcome,
        }
    }

    fn evaluate(&self, unit: &Unit) -> Result<Label, UnitError> {
        let raw = self.loader.load(unit)?;
        let features = self.extractor.extract_raw(&raw)?;
        tracing::debug!(
            unit = %unit.id,
            mean_mean = features.mean_mean(),
            var_mean = features.var_mean(),
            "features extracted"
        );
        Ok(self.adapter.score(&features)?)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Applies a trained model to many units with per-unit failure isolation.
pub struct BatchClassifier {
    pipeline: Arc<Pipeline>,
    workers: usize,
    cancel: Arc<AtomicBool>,
}

impl BatchClassifier {
    pub fn new(
        loader: Arc<dyn SeriesLoader>,
        extractor: FeatureExtractor,
        adapter: Arc<dyn ScoringAdapter>,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                loader,
                extractor,
                adapter,
            }),
            workers: 1,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Score up to `workers` units concurrently. 0 and 1 both mean sequential.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Use an externally owned cancel flag (e.g. set from a Ctrl+C handler).
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Classify a single unit.
    pub fn classify_unit(&self, unit: &Unit) -> ClassificationResult {
        self.pipeline.run(unit)
    }

    /// Classify `units` lazily, preserving their order.
    pub fn classify_all(&self, units: Vec<Unit>) -> BatchOutcome {
        if units.is_empty() {
            tracing::info!("no input units to classify");
            return BatchOutcome::NoUnits;
        }

        let total = units.len();
        let workers = self.workers.min(total);
        tracing::info!(units = total, workers, "starting batch");

        let inner = if workers <= 1 {
            StreamInner::Sequential(SequentialStream {
                pipeline: self.pipeline.clone(),
                pending: units.into(),
            })
        } else {
            StreamInner::Ordered(OrderedStream::spawn(
                self.pipeline.clone(),
                units,
                workers,
                self.cancel.clone(),
            ))
        };

        BatchOutcome::Results(ResultStream {
            inner,
            cancel: self.cancel.clone(),
            total,
            emitted: 0,
            finished: false,
            cancelled: false,
        })
    }
}

/// Lazy, ordered sequence of results.
pub struct ResultStream {
    inner: StreamInner,
    cancel: Arc<AtomicBool>,
    total: usize,
    emitted: usize,
    finished: bool,
    cancelled: bool,
}

impl ResultStream {
    /// Number of units in the batch.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of results emitted so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Whether the stream stopped early because of cancellation.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Iterator for ResultStream {
    type Item = ClassificationResult;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let next = match &mut self.inner {
            StreamInner::Sequential(s) => {
                if self.cancel.load(Ordering::SeqCst) {
                    None
                } else {
                    s.next()
                }
            }
            StreamInner::Ordered(s) => s.next(),
        };

        match next {
            Some(result) => {
                self.emitted += 1;
                Some(result)
            }
            None => {
                self.finished = true;
                if self.emitted < self.total {
                    self.cancelled = self.cancel.load(Ordering::SeqCst);
                    if self.cancelled {
                        tracing::warn!(
                            emitted = self.emitted,
                            total = self.total,
                            "batch cancelled"
                        );
                    } else {
                        tracing::error!(
                            emitted = self.emitted,
                            total = self.total,
                            "batch ended before every unit produced a result"
                        );
                    }
                } else {
                    tracing::info!(units = self.total, "batch finished");
                }
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.total - self.emitted))
    }
}

enum StreamInner {
    Sequential(SequentialStream),
    Ordered(OrderedStream),
}

/// One unit per `next()`, on the caller's thread.
struct SequentialStream {
    pipeline: Arc<Pipeline>,
    pending: VecDeque<Unit>,
}

impl SequentialStream {
    fn next(&mut self) -> Option<ClassificationResult> {
        let unit = self.pending.pop_front()?;
        Some(self.pipeline.run(&unit))
    }
}

/// Worker pool with a reorder buffer keyed by unit index.
struct OrderedStream {
    results: Receiver<(usize, ClassificationResult)>,
    buffered: BTreeMap<usize, ClassificationResult>,
    next_index: usize,
    stop: Arc<AtomicBool>,
}

impl OrderedStream {
    fn spawn(
        pipeline: Arc<Pipeline>,
        units: Vec<Unit>,
        workers: usize,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        let units: Arc<[Unit]> = units.into();
        let next_unit = Arc::new(AtomicUsize::new(0));

        let (result_tx, result_rx) = bounded(workers * 2);
        let stop = Arc::new(AtomicBool::new(false));

        for _ in 0..workers {
            let units = units.clone();
            let next_unit = next_unit.clone();
            let results = result_tx.clone();
            let pipeline = pipeline.clone();
            let cancel = cancel.clone();
            let stop = stop.clone();

            thread::spawn(move || loop {
                if cancel.load(Ordering::SeqCst) || stop.load(Ordering::SeqCst) {
                    break;
                }
                let index = next_unit.fetch_add(1, Ordering::SeqCst);
                let Some(unit) = units.get(index) else {
                    break;
                };
                let result = pipeline.run(unit);
                if results.send((index, result)).is_err() {
                    break;
                }
            });
        }

        Self {
            results: result_rx,
            buffered: BTreeMap::new(),
            next_index: 0,
            stop,
        }
    }

    fn next(&mut self) -> Option<ClassificationResult> {
        loop {
            if let Some(result) = self.buffered.remove(&self.next_index) {
                self.next_index += 1;
                return Some(result);
            }
            // all senders gone means every worker has exited
            let (index, result) = self.results.recv().ok()?;
            self.buffered.insert(index, result);
        }
    }
}

impl Drop for OrderedStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeatureConfig;
    use crate::core::features::FeatureMatrix;
    use crate::source::types::RawSeries;
    use std::collections::{HashMap, HashSet};
    use std::time::Duration;

    /// Serves canned series; units without an entry are missing their sheet.
    struct MapLoader {
        series: HashMap<String, RawSeries>,
        delays_ms: HashMap<String, u64>,
        panics: HashSet<String>,
        calls: AtomicUsize,
    }

    impl MapLoader {
        fn new() -> Self {
            Self {
                series: HashMap::new(),
                delays_ms: HashMap::new(),
                panics: HashSet::new(),
                calls: AtomicUsize::new(0),
            }
        }

        fn with(mut self, id: &str, value: f64) -> Self {
            self.series.insert(
                id.to_string(),
                RawSeries::from_pairs((0..1500).map(|i| (i as f64, value))),
            );
            self
        }

        fn slow(mut self, id: &str, ms: u64) -> Self {
            self.delays_ms.insert(id.to_string(), ms);
            self
        }

        fn panicking(mut self, id: &str) -> Self {
            self.panics.insert(id.to_string());
            self
        }
    }

    impl SeriesLoader for MapLoader {
        fn load(&self, unit: &Unit) -> Result<RawSeries, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(ms) = self.delays_ms.get(&unit.id) {
                thread::sleep(Duration::from_millis(*ms));
            }
            if self.panics.contains(&unit.id) {
                panic!("corrupt workbook {}", unit.id);
            }
            self.series
                .get(&unit.id)
                .cloned()
                .ok_or_else(|| LoadError::MissingSection {
                    section: "HAlpha".into(),
                    available: vec!["Sheet1".into()],
                })
        }
    }

    /// Class 0 for a zero mean, class 1 otherwise.
    struct ThresholdAdapter;

    impl ScoringAdapter for ThresholdAdapter {
        fn normalize(&self, features: &FeatureMatrix) -> Result<FeatureMatrix, ScoringError> {
            Ok(features.clone())
        }

        fn classify(&self, features: &FeatureMatrix) -> Result<i64, ScoringError> {
            Ok(if features.mean_mean().unwrap_or(0.0) == 0.0 { 0 } else { 1 })
        }
    }

    fn units(ids: &[&str]) -> Vec<Unit> {
        ids.iter().map(|id| Unit::new(*id, format!("/data/{id}"))).collect()
    }

    fn classifier(loader: MapLoader) -> BatchClassifier {
        BatchClassifier::new(
            Arc::new(loader),
            FeatureExtractor::new(&FeatureConfig::default()),
            Arc::new(ThresholdAdapter),
        )
    }

    fn expect_results(outcome: BatchOutcome) -> ResultStream {
        match outcome {
            BatchOutcome::Results(stream) => stream,
            BatchOutcome::NoUnits => panic!("expected results"),
        }
    }

    #[test]
    fn test_mixed_batch_in_order() {
        let loader = MapLoader::new().with("a.xlsx", 5.0).with("c.xlsx", 0.0);
        let batch = classifier(loader);
        let results: Vec<_> =
            expect_results(batch.classify_all(units(&["a.xlsx", "b.xlsx", "c.xlsx"]))).collect();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].unit_id, "a.xlsx");
        assert_eq!(results[0].label(), Some(Label::Normal));
        assert_eq!(results[1].unit_id, "b.xlsx");
        assert!(matches!(results[1].error(), Some(UnitError::Load(_))));
        assert_eq!(results[2].unit_id, "c.xlsx");
        assert_eq!(results[2].label(), Some(Label::Fault));
    }

    #[test]
    fn test_empty_batch_is_no_units() {
        let batch = classifier(MapLoader::new());
        assert!(matches!(batch.classify_all(Vec::new()), BatchOutcome::NoUnits));
    }

    #[test]
    fn test_sequential_stream_is_lazy() {
        let loader = Arc::new(MapLoader::new().with("a", 1.0).with("b", 1.0));
        let batch = BatchClassifier::new(
            loader.clone(),
            FeatureExtractor::new(&FeatureConfig::default()),
            Arc::new(ThresholdAdapter),
        );
        let mut stream = expect_results(batch.classify_all(units(&["a", "b"])));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);

        stream.next().unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parallel_preserves_order() {
        let loader = MapLoader::new()
            .with("a", 1.0)
            .with("b", 0.0)
            .with("c", 2.0)
            .with("d", 0.0)
            .slow("a", 80)
            .slow("b", 40);
        let batch = classifier(loader).with_workers(4);
        let results: Vec<_> =
            expect_results(batch.classify_all(units(&["a", "b", "c", "d", "e"]))).collect();

        let ids: Vec<&str> = results.iter().map(|r| r.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(results[0].label(), Some(Label::Normal));
        assert_eq!(results[1].label(), Some(Label::Fault));
        assert_eq!(results[2].label(), Some(Label::Normal));
        assert_eq!(results[3].label(), Some(Label::Fault));
        assert_eq!(results[4].severity(), Severity::Error);
    }

    #[test]
    fn test_cancel_before_start_emits_nothing() {
        let batch = classifier(MapLoader::new().with("a", 1.0));
        batch.cancel_flag().store(true, Ordering::SeqCst);

        let mut stream = expect_results(batch.classify_all(units(&["a", "b"])));
        assert!(stream.next().is_none());
        assert!(stream.was_cancelled());
        assert_eq!(stream.emitted(), 0);
    }

    #[test]
    fn test_cancel_between_units() {
        let batch = classifier(MapLoader::new().with("a", 1.0).with("b", 1.0));
        let cancel = batch.cancel_flag();

        let mut stream = expect_results(batch.classify_all(units(&["a", "b", "c"])));
        let first = stream.next().unwrap();
        assert_eq!(first.label(), Some(Label::Normal));

        cancel.store(true, Ordering::SeqCst);
        assert!(stream.next().is_none());
        assert!(stream.was_cancelled());
        assert_eq!(stream.emitted(), 1);
    }

    fn assert_panic_isolated(results: &[ClassificationResult]) {
        let ids: Vec<&str> = results.iter().map(|r| r.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(results[0].label(), Some(Label::Normal));
        assert_eq!(results[2].label(), Some(Label::Fault));
        assert_eq!(results[3].label(), Some(Label::Normal));

        let err = results[1].error().unwrap();
        assert_eq!(err.stage(), "internal");
        assert_eq!(err, &UnitError::Panicked("corrupt workbook b".into()));
        assert_eq!(
            results[1].to_string(),
            "b -> ERROR: internal error: corrupt workbook b"
        );
    }

    fn panicking_loader() -> MapLoader {
        MapLoader::new()
            .with("a", 1.0)
            .with("b", 1.0)
            .with("c", 0.0)
            .with("d", 3.0)
            .panicking("b")
    }

    #[test]
    fn test_sequential_panic_becomes_unit_error() {
        let batch = classifier(panicking_loader());
        let mut stream = expect_results(batch.classify_all(units(&["a", "b", "c", "d"])));
        let results: Vec<_> = stream.by_ref().collect();

        assert_panic_isolated(&results);
        assert!(!stream.was_cancelled());
        assert_eq!(stream.emitted(), 4);
    }

    #[test]
    fn test_parallel_panic_becomes_unit_error() {
        let batch = classifier(panicking_loader().slow("a", 30)).with_workers(2);
        let mut stream = expect_results(batch.classify_all(units(&["a", "b", "c", "d"])));
        let results: Vec<_> = stream.by_ref().collect();

        assert_panic_isolated(&results);
        assert!(!stream.was_cancelled());
        assert!(!batch.cancel_flag().load(Ordering::SeqCst));
    }

    #[test]
    fn test_parallel_cancel_stops_after_in_order_prefix() {
        let ids = ["u0", "u1", "u2", "u3", "u4", "u5", "u6", "u7"];
        let mut loader = MapLoader::new();
        for id in ids {
            loader = loader.with(id, 1.0).slow(id, 30);
        }
        let batch = classifier(loader).with_workers(2);
        let cancel = batch.cancel_flag();

        let mut stream = expect_results(batch.classify_all(units(&ids)));
        let first = stream.next().unwrap();
        assert_eq!(first.unit_id, "u0");

        cancel.store(true, Ordering::SeqCst);
        let rest: Vec<_> = stream.by_ref().collect();

        let emitted: Vec<&str> = std::iter::once(first.unit_id.as_str())
            .chain(rest.iter().map(|r| r.unit_id.as_str()))
            .collect();
        assert_eq!(emitted, ids[..emitted.len()].to_vec());
        assert!(emitted.len() < ids.len());
        assert!(stream.was_cancelled());
        assert_eq!(stream.emitted(), emitted.len());
    }

    #[test]
    fn test_result_rendering() {
        let normal = ClassificationResult {
            unit_id: "a.xlsx".into(),
            outcome: Outcome::Label(Label::Normal),
        };
        let fault = ClassificationResult {
            unit_id: "b.xlsx".into(),
            outcome: Outcome::Label(Label::Fault),
        };
        let error = ClassificationResult {
            unit_id: "c.xlsx".into(),
            outcome: Outcome::Error(UnitError::Extraction(ExtractionError::MissingStartTime {
                start_time: 0.0,
            })),
        };
        assert_eq!(normal.to_string(), "a.xlsx -> NORMAL");
        assert_eq!(fault.to_string(), "b.xlsx -> FAULT");
        assert_eq!(
            error.to_string(),
            "c.xlsx -> ERROR: 0 ms not found in time column"
        );
        assert_eq!(error.severity(), Severity::Error);
        assert!(error.label().is_none());
    }
}
