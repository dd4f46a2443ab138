use std::{
    fs,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::Duration,
};

use is_it_fake::{
    ArtifactError, ArtifactStore, Category, DetectorError, ErrorKind, FileArtifactStore,
    MemoryArtifactStore, RetryPolicy, ReviewDetector, TrainedPipeline, TrainingConfig, Verdict,
    training::{self, LabeledExample},
};
use rstest::{fixture, rstest};

const TOY_CSV: &str = "\
category,rating,label,text_
Electronics,1.0,OR,The item arrived broken and I am disappointed
Electronics,1.0,OR,\"Box arrived damaged, screen broken, really disappointed\"
Home,5.0,CG,amazing best perfect buy now
Home,5.0,CG,amazing product best purchase perfect buy now
";

fn toy_config() -> TrainingConfig {
    TrainingConfig {
        holdout_fraction: 0.0,
        search_alphas: Vec::new(),
        ..TrainingConfig::default()
    }
}

#[fixture]
fn toy_pipeline() -> TrainedPipeline {
    let examples = [
        ("The item arrived broken and I am disappointed", Category::Authentic),
        ("Box arrived damaged, screen broken, really disappointed", Category::Authentic),
        ("amazing best perfect buy now", Category::Generated),
        ("amazing product best purchase perfect buy now", Category::Generated),
    ]
    .map(|(text, label)| LabeledExample::new(text, label));
    training::train(&examples, &toy_config())
        .expect("toy dataset trains")
        .0
}

/// Wraps a store, counting loads and making each one slow.
struct CountingStore<S> {
    inner: S,
    loads: AtomicUsize,
    delay: Duration,
}

impl<S: ArtifactStore> ArtifactStore for CountingStore<S> {
    fn load(&self) -> Result<TrainedPipeline, ArtifactError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.inner.load()
    }

    fn save(&self, pipeline: &TrainedPipeline) -> Result<(), ArtifactError> {
        self.inner.save(pipeline)
    }

    fn describe(&self) -> String {
        format!("counting({})", self.inner.describe())
    }
}

#[test]
fn test_train_persist_load_predict() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("fake_reviews.csv");
    let model = dir.path().join("artifacts/review-classifier.bin");
    fs::write(&csv, TOY_CSV).unwrap();

    let store = FileArtifactStore::new(&model);
    let report = training::train_and_save(&csv, &toy_config(), &store).unwrap();
    assert_eq!(report.rows_read, 4);
    assert_eq!(report.train_examples, 4);
    assert!(model.exists());

    let detector = ReviewDetector::from_path(&model);
    assert!(!detector.is_ready());
    assert_eq!(
        detector
            .classify("this amazing product is the best buy now")
            .unwrap(),
        Category::Generated
    );
    assert_eq!(
        detector
            .classify("item arrived broken and I was very disappointed")
            .unwrap(),
        Category::Authentic
    );
    assert!(detector.is_ready());
}

#[rstest]
fn test_prediction_is_deterministic(toy_pipeline: TrainedPipeline) {
    let store = MemoryArtifactStore::with_pipeline(&toy_pipeline).unwrap();
    let detector = ReviewDetector::with_store(store);
    let first = detector.predict("best purchase, arrived broken").unwrap();
    for _ in 0..10 {
        assert_eq!(detector.predict("best purchase, arrived broken").unwrap(), first);
    }
}

#[rstest]
fn test_concurrent_first_use_loads_once(toy_pipeline: TrainedPipeline) {
    let store = CountingStore {
        inner: MemoryArtifactStore::with_pipeline(&toy_pipeline).unwrap(),
        loads: AtomicUsize::new(0),
        delay: Duration::from_millis(50),
    };
    let detector = ReviewDetector::with_store(store);

    let categories = thread::scope(|scope| {
        let handles = (0..8)
            .map(|_| scope.spawn(|| detector.classify("amazing best perfect buy")))
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>()
    });

    assert_eq!(detector.model().store().loads.load(Ordering::SeqCst), 1);
    for category in categories {
        assert_eq!(category.unwrap(), Category::Generated);
    }
}

#[test]
fn test_missing_artifact_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let detector = ReviewDetector::from_path(dir.path().join("nowhere.bin"))
        .with_retry_policy(RetryPolicy::Never);

    let err = detector.predict("a perfectly normal review").unwrap_err();
    assert!(matches!(err, DetectorError::ModelUnavailable(_)));
    assert!(detector.preload().is_err());
    assert!(!detector.is_ready());
    // Never trains or writes on the serving side.
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_degraded_detector_recovers_after_artifact_appears() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("model.bin");
    let detector = ReviewDetector::from_path(&model).with_retry_policy(RetryPolicy::Always);
    assert_eq!(
        detector.predict("a review").unwrap_err().kind(),
        ErrorKind::ModelUnavailable
    );

    let csv = dir.path().join("reviews.csv");
    fs::write(&csv, TOY_CSV).unwrap();
    training::train_and_save(&csv, &toy_config(), &FileArtifactStore::new(&model)).unwrap();

    assert!(detector.predict("a review").is_ok());
}

#[test]
fn test_corrupt_artifact_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("model.bin");
    fs::write(&model, b"definitely not a model").unwrap();
    let detector = ReviewDetector::from_path(&model);
    assert_eq!(
        detector.predict("a review").unwrap_err().kind(),
        ErrorKind::ModelUnavailable
    );
}

#[rstest]
#[case(Some(""))]
#[case(Some("   \n"))]
#[case(None)]
fn test_empty_input_is_invalid(toy_pipeline: TrainedPipeline, #[case] text: Option<&str>) {
    let store = MemoryArtifactStore::with_pipeline(&toy_pipeline).unwrap();
    let detector = ReviewDetector::with_store(store);
    match detector.verdict(text) {
        Verdict::Failed { kind, .. } => assert_eq!(kind, ErrorKind::InvalidInput),
        other => panic!("unexpected verdict {other:?}"),
    }
}

#[rstest]
fn test_verdict_labels(toy_pipeline: TrainedPipeline) {
    let store = MemoryArtifactStore::with_pipeline(&toy_pipeline).unwrap();
    let detector = ReviewDetector::with_store(store);
    let Verdict::Classified {
        label, confidence, ..
    } = detector.verdict(Some("Box arrived damaged and broken"))
    else {
        panic!("expected a classification");
    };
    assert_eq!(label, "Original Review");
    let percent: f64 = confidence
        .trim_start_matches("Model confidence: ")
        .trim_end_matches('%')
        .parse()
        .unwrap();
    assert!((50.0..=100.0).contains(&percent));
}
