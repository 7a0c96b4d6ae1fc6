//! Integration tests for the workbook loader against real xlsx files.

use plasma_fault_detector::config::{Config, FeatureConfig};
use plasma_fault_detector::core::{BatchOutcome, FeatureExtractor, UnitError};
use plasma_fault_detector::scoring::{
    Kernel, Label, ModelArtifacts, ModelMetadata, StandardScaler, SvmClassifier,
};
use plasma_fault_detector::source::{Cell, LoadError, SeriesLoader, Unit, WorkbookLoader};
use plasma_fault_detector::startup::prepare_run;
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};
use uuid::Uuid;

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pfd-xlsx-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write a workbook with one `(time, value)` sheet named `sheet`, plus an
/// unrelated notes sheet in front of it.
fn write_trace(
    path: &Path,
    sheet: &str,
    header: bool,
    rows: impl IntoIterator<Item = (f64, f64)>,
) {
    let mut workbook = Workbook::new();

    let notes = workbook.add_worksheet();
    notes.set_name("Notes").unwrap();
    notes.write_string(0, 0, "shot log").unwrap();

    let data = workbook.add_worksheet();
    data.set_name(sheet).unwrap();
    let mut row = 0u32;
    if header {
        data.write_string(0, 0, "Time (ms)").unwrap();
        data.write_string(0, 1, "HAlpha").unwrap();
        row = 1;
    }
    for (time, value) in rows {
        data.write_number(row, 0, time).unwrap();
        data.write_number(row, 1, value).unwrap();
        row += 1;
    }

    workbook.save(path).unwrap();
}

/// Times 1600 down to 0, value equal to the time.
fn descending_ramp() -> impl Iterator<Item = (f64, f64)> {
    (0..=1600).rev().map(|t| (t as f64, t as f64))
}

#[test]
fn test_header_and_unsorted_rows_load_and_extract() {
    let dir = scratch_dir();
    let path = dir.join("shot.xlsx");
    write_trace(&path, "HAlpha", true, descending_ramp());

    let raw = WorkbookLoader::new("HAlpha")
        .load(&Unit::from_path(&path))
        .unwrap();
    assert_eq!(raw.len(), 1602);
    assert_eq!(raw.rows[0].0, Cell::Text("Time (ms)".into()));
    assert_eq!(raw.rows[1], (Cell::Number(1600.0), Cell::Number(1600.0)));

    let features = FeatureExtractor::new(&FeatureConfig::default())
        .extract_raw(&raw)
        .unwrap();

    // window means are 80*i + 49.5 for i in 0..18 once sorted by time
    let mean_mean = features.mean_mean().unwrap();
    let var_mean = features.var_mean().unwrap();
    assert!((mean_mean - 729.5).abs() < 1e-9);
    assert!((var_mean - 6400.0 * (18.0 * 18.0 - 1.0) / 12.0).abs() < 1e-6);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_constant_trace_without_header() {
    let dir = scratch_dir();
    let path = dir.join("flat.xlsx");
    write_trace(&path, "HAlpha", false, (0..1600).map(|t| (t as f64, 2.0)));

    let raw = WorkbookLoader::new("HAlpha")
        .load(&Unit::from_path(&path))
        .unwrap();
    let features = FeatureExtractor::new(&FeatureConfig::default())
        .extract_raw(&raw)
        .unwrap();
    assert_eq!(features.rows(), &[vec![2.0, 0.0]]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_workbook_without_section_is_missing_section() {
    let dir = scratch_dir();
    let path = dir.join("other.xlsx");
    write_trace(&path, "Other", true, descending_ramp());

    let err = WorkbookLoader::new("HAlpha")
        .load(&Unit::from_path(&path))
        .unwrap_err();
    assert_eq!(
        err,
        LoadError::MissingSection {
            section: "HAlpha".into(),
            available: vec!["Notes".into(), "Other".into()],
        }
    );
    assert!(err.to_string().starts_with("HAlpha sheet not found"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_folder_of_workbooks_classified_in_order() {
    let dir = scratch_dir();
    let data = dir.join("Data");
    let models = dir.join("Models");
    std::fs::create_dir_all(&data).unwrap();

    ModelArtifacts::from_parts(
        StandardScaler::identity(2),
        SvmClassifier {
            kernel: Kernel::Linear,
            support_vectors: vec![vec![0.0, 1.0]],
            dual_coef: vec![1.0],
            intercept: -1e-9,
            classes: [0, 1],
        },
        ModelMetadata::default(),
    )
    .unwrap()
    .save(&models)
    .unwrap();

    write_trace(&data.join("a.xlsx"), "HAlpha", true, descending_ramp());
    write_trace(&data.join("b.xlsx"), "Other", true, descending_ramp());
    write_trace(
        &data.join("c.xlsx"),
        "HAlpha",
        true,
        (0..1600).map(|t| (t as f64, 0.0)),
    );

    let mut config = Config::default();
    config.workers = 2;
    let run = prepare_run(&config, &data, &models).unwrap();
    let results: Vec<_> = match run.classifier.classify_all(run.units) {
        BatchOutcome::Results(stream) => stream.collect(),
        BatchOutcome::NoUnits => panic!("expected results"),
    };

    let ids: Vec<&str> = results.iter().map(|r| r.unit_id.as_str()).collect();
    assert_eq!(ids, ["a.xlsx", "b.xlsx", "c.xlsx"]);
    assert_eq!(results[0].label(), Some(Label::Normal));
    assert!(matches!(
        results[1].error(),
        Some(UnitError::Load(LoadError::MissingSection { .. }))
    ));
    assert_eq!(results[2].label(), Some(Label::Fault));

    let _ = std::fs::remove_dir_all(&dir);
}
