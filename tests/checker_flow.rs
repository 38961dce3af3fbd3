use std::collections::VecDeque;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use async_trait::async_trait;
use gradewatch::{run, DisabledNotifier, GradeRecord, GradeSnapshot, GradeSource, Notifier, RunOutcome, SnapshotStore};

/// Hands out one scripted result per fetch.
struct ScriptedSource {
    results: Mutex<VecDeque<GradeSnapshot>>,
}

impl ScriptedSource {
    fn new(results: Vec<GradeSnapshot>) -> Self {
        Self { results: Mutex::new(results.into()) }
    }
}

#[async_trait]
impl GradeSource for ScriptedSource {
    async fn fetch(&self) -> GradeSnapshot {
        self.results.lock().unwrap().pop_front().unwrap_or_default()
    }
}

#[derive(Default)]
struct CountingNotifier {
    calls: AtomicUsize,
    last: Mutex<Option<GradeSnapshot>>,
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn notify(&self, grades: &GradeSnapshot) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(grades.clone());
        true
    }
}

fn math(grade: &str) -> GradeSnapshot {
    vec![GradeRecord::new("Math", grade)]
}

#[tokio::test]
async fn three_runs_save_and_notify_only_on_change() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grades.json");
    let store = SnapshotStore::new(&path);
    store.save(&Vec::new()).unwrap();

    let source = ScriptedSource::new(vec![math("90"), math("90"), math("95")]);
    let notifier = CountingNotifier::default();

    // 1) [] -> [Math 90]
    let outcome = run(&source, &store, &notifier).await;
    assert_eq!(outcome, RunOutcome::Changed { courses: 1, saved: true, notified: true });
    assert_eq!(store.load(), math("90"));
    assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    assert_eq!(notifier.last.lock().unwrap().clone(), Some(math("90")));

    // 2) same grades: no save, no notification
    let modified = fs::metadata(&path).unwrap().modified().unwrap();
    let outcome = run(&source, &store, &notifier).await;
    assert_eq!(outcome, RunOutcome::Unchanged);
    assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), modified);
    assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);

    // 3) [Math 95] overwrites
    let outcome = run(&source, &store, &notifier).await;
    assert_eq!(outcome, RunOutcome::Changed { courses: 1, saved: true, notified: true });
    assert_eq!(store.load(), math("95"));
    assert_eq!(notifier.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn empty_fetch_keeps_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grades.json");
    let store = SnapshotStore::new(&path);
    let previous = vec![GradeRecord::new("高等数学", "95"), GradeRecord::new("大学英语", "良好")];
    store.save(&previous).unwrap();
    let before = fs::read(&path).unwrap();

    let source = ScriptedSource::new(vec![Vec::new()]);
    let notifier = CountingNotifier::default();

    let outcome = run(&source, &store, &notifier).await;

    assert_eq!(outcome, RunOutcome::NothingFetched);
    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(store.load(), previous);
    assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn corrupt_snapshot_counts_as_no_prior_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grades.json");
    fs::write(&path, "[{\"tabGrid_kcmc\": ").unwrap();
    let store = SnapshotStore::new(&path);

    let source = ScriptedSource::new(vec![math("90")]);
    let notifier = CountingNotifier::default();

    let outcome = run(&source, &store, &notifier).await;

    assert_eq!(outcome, RunOutcome::Changed { courses: 1, saved: true, notified: true });
    assert_eq!(store.load(), math("90"));
    assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reordered_rows_trigger_a_notification() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("grades.json"));
    store
        .save(&vec![GradeRecord::new("Math", "90"), GradeRecord::new("Art", "A")])
        .unwrap();

    let source = ScriptedSource::new(vec![vec![GradeRecord::new("Art", "A"), GradeRecord::new("Math", "90")]]);
    let notifier = CountingNotifier::default();

    let outcome = run(&source, &store, &notifier).await;

    assert_eq!(outcome, RunOutcome::Changed { courses: 2, saved: true, notified: true });
    assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_save_still_notifies() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the snapshot file should be: load reads nothing, save cannot rename over it.
    let path = dir.path().join("grades.json");
    fs::create_dir(&path).unwrap();
    let store = SnapshotStore::new(&path);

    let source = ScriptedSource::new(vec![math("90")]);
    let notifier = CountingNotifier::default();

    let outcome = run(&source, &store, &notifier).await;

    assert_eq!(outcome, RunOutcome::Changed { courses: 1, saved: false, notified: true });
    assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    assert!(path.is_dir());
    assert_eq!(outcome.exit_status(true), 4);
}

#[tokio::test]
async fn unavailable_notifier_keeps_the_snapshot_current() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("grades.json"));
    let source = ScriptedSource::new(vec![math("90")]);

    let outcome = run(&source, &store, &DisabledNotifier).await;

    assert_eq!(outcome, RunOutcome::Changed { courses: 1, saved: true, notified: false });
    assert_eq!(store.load(), math("90"));
    assert_eq!(outcome.exit_status(false), 0);
    assert_eq!(outcome.exit_status(true), 3);
}
