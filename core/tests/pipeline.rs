use framecheck_core::{
    compute_metrics, load_and_filter, read_report, write_report, BlurMeasure, Catalog,
    DecodeError, DirectoryOutcome, ImageDecoder, MetricEngine, Pipeline, PipelineError,
    QualityConfig, ZeroVariance, BLANK_THRESHOLD,
};
use image::{ImageBuffer, ImageFormat, Luma};
use indicatif::ProgressBar;
use ndarray::{Array2, ArrayD, ArrayViewD};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use tiff::encoder::{colortype, TiffEncoder};

fn write_tiff(path: &Path, width: u32, height: u32, pixel: impl Fn(u32, u32) -> u8) {
    let buffer = ImageBuffer::from_fn(width, height, |x, y| Luma([pixel(x, y)]));
    buffer.save_with_format(path, ImageFormat::Tiff).unwrap();
}

fn write_stack(path: &Path, size: u32, pages: &[u8]) {
    let mut file = fs::File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(&mut file).unwrap();
    for &value in pages {
        let data = vec![value; (size * size) as usize];
        encoder
            .write_image::<colortype::Gray8>(size, size, &data)
            .unwrap();
    }
}

fn two_level(path: &Path, low: u8, high: u8) {
    write_tiff(path, 8, 8, |x, _| if x % 2 == 0 { low } else { high });
}

fn never_asked(_: &Path) -> bool {
    panic!("confirmation requested without an existing report")
}

fn snr_of(rows: &[framecheck_core::ReportRow], name: &str) -> Option<f64> {
    rows.iter()
        .find(|row| row.name == name)
        .and_then(|row| row.signal_noise_ratio)
}

struct MemoryDecoder(HashMap<PathBuf, ArrayD<f64>>);

impl ImageDecoder for MemoryDecoder {
    fn decode(&self, path: &Path) -> Result<ArrayD<f64>, DecodeError> {
        self.0.get(path).cloned().ok_or_else(|| DecodeError::Io {
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
            path: path.to_path_buf(),
        })
    }
}

#[test]
fn duplicate_names_and_blank_frames_end_up_correctly_in_report() {
    let images: HashMap<PathBuf, ArrayD<f64>> = [
        (
            PathBuf::from("one/a.tif"),
            Array2::from_shape_fn((8, 8), |(_, c)| if c % 2 == 0 { 40.0 } else { 60.0 }).into_dyn(),
        ),
        (
            PathBuf::from("two/a.tif"),
            Array2::from_shape_fn((8, 8), |(_, c)| if c % 2 == 0 { 30.0 } else { 70.0 }).into_dyn(),
        ),
        (PathBuf::from("b.tif"), Array2::zeros((8, 8)).into_dyn()),
    ]
    .into_iter()
    .collect();

    let mut catalog = Catalog::new();
    assert_eq!(catalog.register(Path::new("one/a.tif")), "a.tif");
    assert_eq!(catalog.register(Path::new("b.tif")), "b.tif");
    assert_eq!(catalog.register(Path::new("two/a.tif")), "a(2).tif");

    let progress = ProgressBar::hidden();
    let stats = load_and_filter(
        &mut catalog,
        &MemoryDecoder(images),
        BLANK_THRESHOLD,
        &progress,
    )
    .unwrap();
    assert_eq!(stats.blank, 1);
    compute_metrics(&mut catalog, &MetricEngine::default(), &progress);

    let dir = tempdir().unwrap();
    let target = dir.path().join("scenario.csv");
    write_report(&target, &catalog).unwrap();
    let rows = read_report(&target).unwrap();

    let names: Vec<_> = rows.iter().map(|row| row.name.as_str()).collect();
    assert_eq!(names, vec!["a.tif", "a(2).tif"]);
    assert!((rows[0].signal_noise_ratio.unwrap() - 25.0).abs() < 1e-9);
    assert!((rows[1].signal_noise_ratio.unwrap() - 6.25).abs() < 1e-9);
    assert!(rows
        .iter()
        .all(|row| (0.0..=1.0).contains(&row.blur_score.unwrap())));
}

#[test]
fn recursive_run_writes_report_beside_directory() {
    let root = tempdir().unwrap();
    let stack = root.path().join("stack");
    fs::create_dir_all(stack.join("one")).unwrap();
    fs::create_dir_all(stack.join("two")).unwrap();
    two_level(&stack.join("one").join("a.tif"), 40, 60);
    two_level(&stack.join("two").join("a.tif"), 30, 70);
    write_tiff(&stack.join("b.tif"), 8, 8, |_, _| 0);
    fs::write(stack.join("notes.txt"), "not an image").unwrap();

    let config = QualityConfig {
        recursive: true,
        ..QualityConfig::default()
    };
    let outcome = Pipeline::new(config)
        .process_directory(&stack, &mut never_asked, &ProgressBar::hidden())
        .unwrap();

    let report = root.path().join("stack.csv");
    assert_eq!(
        outcome,
        DirectoryOutcome::Written {
            report: report.clone(),
            file_name: String::from("stack.csv"),
            rows: 2,
            blank: 1,
        }
    );

    let rows = read_report(&report).unwrap();
    let mut names: Vec<_> = rows.iter().map(|row| row.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["a(2).tif", "a.tif"]);
    let mut snrs: Vec<f64> = rows.iter().filter_map(|row| row.signal_noise_ratio).collect();
    snrs.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert!((snrs[0] - 6.25).abs() < 1e-9);
    assert!((snrs[1] - 25.0).abs() < 1e-9);
}

#[test]
fn declined_overwrite_leaves_report_untouched() {
    let root = tempdir().unwrap();
    let stack = root.path().join("run");
    fs::create_dir_all(&stack).unwrap();
    two_level(&stack.join("a.tif"), 40, 60);

    let pipeline = Pipeline::new(QualityConfig::default());
    let progress = ProgressBar::hidden();
    pipeline
        .process_directory(&stack, &mut never_asked, &progress)
        .unwrap();
    let report = root.path().join("run.csv");
    let first = fs::read(&report).unwrap();

    two_level(&stack.join("c.tif"), 10, 90);
    let mut asked = 0;
    let mut decline = |_: &Path| {
        asked += 1;
        false
    };
    let outcome = pipeline
        .process_directory(&stack, &mut decline, &progress)
        .unwrap();
    assert_eq!(outcome, DirectoryOutcome::Skipped { report: report.clone() });
    assert_eq!(fs::read(&report).unwrap(), first);

    let summary = pipeline
        .run(&[stack.clone()], &mut decline, &progress)
        .unwrap();
    assert_eq!(summary.skipped().collect::<Vec<_>>(), vec![report.as_path()]);
    assert_eq!(fs::read(&report).unwrap(), first);
    assert_eq!(asked, 2);

    let mut accept = |_: &Path| true;
    let outcome = pipeline
        .process_directory(&stack, &mut accept, &progress)
        .unwrap();
    assert!(matches!(outcome, DirectoryOutcome::Written { rows: 2, .. }));
    assert_ne!(fs::read(&report).unwrap(), first);
}

#[test]
fn blank_threshold_boundary_on_disk() {
    let root = tempdir().unwrap();
    let stack = root.path().join("edges");
    fs::create_dir_all(&stack).unwrap();
    write_tiff(&stack.join("exact.tif"), 4, 4, |_, y| if y == 0 { 1 } else { 50 });
    write_tiff(&stack.join("below.tif"), 4, 4, |x, y| if y == 0 { (x % 2) as u8 } else { 50 });

    let outcome = Pipeline::new(QualityConfig::default())
        .process_directory(&stack, &mut never_asked, &ProgressBar::hidden())
        .unwrap();
    assert!(matches!(outcome, DirectoryOutcome::Written { rows: 1, blank: 1, .. }));

    let rows = read_report(&root.path().join("edges.csv")).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "exact.tif");
}

#[test]
fn flat_frame_reports_configured_sentinel() {
    let root = tempdir().unwrap();
    let stack = root.path().join("flat");
    fs::create_dir_all(&stack).unwrap();
    write_tiff(&stack.join("grey.tif"), 6, 6, |_, _| 80);

    let progress = ProgressBar::hidden();
    Pipeline::new(QualityConfig::default())
        .process_directory(&stack, &mut never_asked, &progress)
        .unwrap();
    let rows = read_report(&root.path().join("flat.csv")).unwrap();
    assert_eq!(snr_of(&rows, "grey.tif"), Some(f64::INFINITY));

    let capped = QualityConfig {
        zero_variance: ZeroVariance::Cap(1.0e6),
        report_dir: Some(root.path().join("capped")),
        ..QualityConfig::default()
    };
    Pipeline::new(capped)
        .process_directory(&stack, &mut never_asked, &progress)
        .unwrap();
    let rows = read_report(&root.path().join("capped").join("flat.csv")).unwrap();
    assert_eq!(snr_of(&rows, "grey.tif"), Some(1.0e6));
}

#[test]
fn batch_stops_at_first_failure_unless_isolated() {
    let root = tempdir().unwrap();
    let missing = root.path().join("missing");
    let good = root.path().join("good");
    fs::create_dir_all(&good).unwrap();
    two_level(&good.join("a.tif"), 40, 60);
    let directories = vec![missing.clone(), good.clone()];
    let progress = ProgressBar::hidden();

    let strict = Pipeline::new(QualityConfig::default());
    let result = strict.run(&directories, &mut never_asked, &progress);
    assert!(matches!(result, Err(PipelineError::Scan { .. })));
    assert!(!root.path().join("good.csv").exists());

    let lenient = Pipeline::new(QualityConfig::default()).with_keep_going(true);
    let summary = lenient
        .run(&directories, &mut never_asked, &progress)
        .unwrap();
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].directory(), missing.as_path());
    assert_eq!(summary.written().count(), 1);
    assert!(root.path().join("good.csv").exists());
}

#[test]
fn corrupt_candidate_aborts_directory() {
    let root = tempdir().unwrap();
    let stack = root.path().join("corrupt");
    fs::create_dir_all(&stack).unwrap();
    fs::write(stack.join("broken.tif"), b"definitely not a tiff").unwrap();

    let result = Pipeline::new(QualityConfig::default()).process_directory(
        &stack,
        &mut never_asked,
        &ProgressBar::hidden(),
    );
    match result {
        Err(error @ PipelineError::Decode { .. }) => {
            assert_eq!(error.directory(), stack.as_path());
            assert!(error.to_string().contains("broken.tif"));
        }
        other => panic!("expected a decode failure, got {:?}", other),
    }
    assert!(!root.path().join("corrupt.csv").exists());
}

#[test]
fn multi_page_stacks_are_scored_as_volumes() {
    let root = tempdir().unwrap();
    let run = root.path().join("volumes");
    fs::create_dir_all(&run).unwrap();
    write_stack(&run.join("bright.tif"), 4, &[10, 110, 210]);
    write_stack(&run.join("dark_first.tif"), 4, &[0, 200, 200]);

    let outcome = Pipeline::new(QualityConfig::default())
        .process_directory(&run, &mut never_asked, &ProgressBar::hidden())
        .unwrap();
    assert!(matches!(outcome, DirectoryOutcome::Written { rows: 1, blank: 1, .. }));

    let rows = read_report(&root.path().join("volumes.csv")).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "bright.tif");
    // Pages of 10, 110 and 210: mean 110, population variance 20000 / 3.
    let expected = 110.0 * 110.0 * 3.0 / 20000.0;
    assert!((rows[0].signal_noise_ratio.unwrap() - expected).abs() < 1e-9);
}

struct FixedBlur(f64);

impl BlurMeasure for FixedBlur {
    fn blur(&self, _image: &ArrayViewD<f64>) -> f64 {
        self.0
    }
}

#[test]
fn injected_decoder_and_engine_drive_the_report() {
    let root = tempdir().unwrap();
    let run = root.path().join("injected");
    fs::create_dir_all(&run).unwrap();
    fs::write(run.join("only.tif"), b"placeholder").unwrap();

    let images: HashMap<PathBuf, ArrayD<f64>> = [(
        run.join("only.tif"),
        Array2::from_shape_fn((8, 8), |(_, c)| if c % 2 == 0 { 40.0 } else { 60.0 }).into_dyn(),
    )]
    .into_iter()
    .collect();

    let pipeline = Pipeline::new(QualityConfig {
        zero_variance: ZeroVariance::Cap(5.0),
        ..QualityConfig::default()
    })
    .with_decoder(MemoryDecoder(images))
    .with_engine(MetricEngine::new(FixedBlur(0.75)));
    assert_eq!(pipeline.config().zero_variance, ZeroVariance::Cap(5.0));

    pipeline
        .process_directory(&run, &mut never_asked, &ProgressBar::hidden())
        .unwrap();
    let rows = read_report(&root.path().join("injected.csv")).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].blur_score, Some(0.75));
    assert!((rows[0].signal_noise_ratio.unwrap() - 25.0).abs() < 1e-9);
}
