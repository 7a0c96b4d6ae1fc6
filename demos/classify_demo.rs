//! Demonstration of the Plasma Fault Detector batch pipeline.
//!
//! This example shows how to:
//! 1. Assemble a trained model from its parameters
//! 2. Plug a custom `SeriesLoader` into the batch classifier
//! 3. Consume the ordered result stream
//! 4. Render results with a console sink and tally the run
//!
//! Run with: cargo run --example classify_demo
//!
//! No signal files are needed: the loader synthesizes traces in memory.

use std::collections::HashMap;
use std::sync::Arc;

use plasma_fault_detector::{
    config::FeatureConfig,
    core::{BatchClassifier, BatchOutcome, FeatureExtractor},
    report::{ConsoleSink, ResultSink, RunLog},
    scoring::{Kernel, ModelArtifacts, ModelMetadata, StandardScaler, SvmClassifier},
    source::{LoadError, RawSeries, SeriesLoader, Unit},
};

/// Serves synthetic traces keyed by unit id.
struct SyntheticLoader {
    traces: HashMap<String, RawSeries>,
}

impl SeriesLoader for SyntheticLoader {
    fn load(&self, unit: &Unit) -> Result<RawSeries, LoadError> {
        self.traces
            .get(&unit.id)
            .cloned()
            .ok_or_else(|| LoadError::MissingSection {
                section: "HAlpha".into(),
                available: vec!["Sheet1".into()],
            })
    }
}

/// 2000 samples at 1 ms spacing starting at t = 0.
fn trace(signal: impl Fn(usize) -> f64) -> RawSeries {
    RawSeries::from_pairs((0..2000).map(|i| (i as f64, signal(i))))
}

fn main() {
    println!("Plasma Fault Detector - Classify Demo");
    println!("=====================================");
    println!();

    // A linear model that calls a trace healthy once its window means vary.
    let model = ModelArtifacts::from_parts(
        StandardScaler::identity(2),
        SvmClassifier {
            kernel: Kernel::Linear,
            support_vectors: vec![vec![0.0, 1.0]],
            dual_coef: vec![1.0],
            intercept: -1e-6,
            classes: [0, 1],
        },
        ModelMetadata::default(),
    );
    let model = match model {
        Ok(model) => Arc::new(model),
        Err(e) => {
            eprintln!("Invalid model: {e}");
            return;
        }
    };
    println!(
        "Model: {} kernel, {} support vector(s)",
        model.classifier().kernel.name(),
        model.classifier().n_support()
    );

    let mut traces = HashMap::new();
    traces.insert(
        "shot_001.xlsx".to_string(),
        trace(|i| 2.0 + (i as f64 / 40.0).sin()),
    );
    traces.insert("shot_002.xlsx".to_string(), trace(|_| 0.0));
    traces.insert(
        "shot_004.xlsx".to_string(),
        trace(|i| if i < 700 { 1.5 + (i as f64 / 25.0).cos() } else { 0.0 }),
    );

    let units: Vec<Unit> = ["shot_001.xlsx", "shot_002.xlsx", "shot_003.xlsx", "shot_004.xlsx"]
        .iter()
        .map(|id| Unit::new(*id, format!("Data/{id}")))
        .collect();

    let batch = BatchClassifier::new(
        Arc::new(SyntheticLoader { traces }),
        FeatureExtractor::new(&FeatureConfig::default()),
        model,
    )
    .with_workers(2);

    let stream = match batch.classify_all(units) {
        BatchOutcome::Results(stream) => stream,
        BatchOutcome::NoUnits => {
            println!("Nothing to classify");
            return;
        }
    };

    let log = RunLog::new();
    let mut sink = ConsoleSink::new(std::io::stdout().lock());
    if let Err(e) = run(&mut sink, &log, stream) {
        eprintln!("Output error: {e}");
        return;
    }

    println!("{}", log.summary());
}

fn run(
    sink: &mut impl ResultSink,
    log: &RunLog,
    mut stream: plasma_fault_detector::ResultStream,
) -> std::io::Result<()> {
    sink.begin(stream.total())?;
    for result in stream.by_ref() {
        log.record(&result);
        sink.record(&result)?;
    }
    sink.finish(&log.stats(), stream.was_cancelled())
}
