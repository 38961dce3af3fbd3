use std::collections::HashMap;
use async_trait::async_trait;
use log::{error, info, warn};
use crate::models::{Comparison, GradeChange, GradeRecord, GradeSnapshot, RunOutcome};
use crate::utils::snapshot::SnapshotStore;

/// Produces the current grade list. Failures come back as an empty list.
#[async_trait]
pub trait GradeSource {
    async fn fetch(&self) -> GradeSnapshot;
}

/// Tells the student that grades changed. Returns whether delivery was confirmed.
#[async_trait]
pub trait Notifier {
    async fn notify(&self, grades: &GradeSnapshot) -> bool;
}

/// Order matters: the same rows in another order count as a change.
pub fn compare(previous: &[GradeRecord], current: &[GradeRecord]) -> Comparison {
    if previous == current {
        Comparison::Unchanged
    } else {
        Comparison::Changed
    }
}

// Keyed by course name, so reordering alone reports nothing. A course listed more than
// once (retakes) is matched occurrence by occurrence. Only used for the log.
pub fn diff_by_course(previous: &[GradeRecord], current: &[GradeRecord]) -> Vec<GradeChange> {
    let mut known: HashMap<&str, Vec<&str>> = HashMap::new();
    for record in previous {
        known.entry(record.course.as_str()).or_default().push(record.grade.as_str());
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    current
        .iter()
        .filter_map(|record| {
            let course = record.course.as_str();
            let nth = seen.entry(course).or_insert(0);
            let old = known.get(course).and_then(|grades| grades.get(*nth)).copied();
            *nth += 1;
            match old {
                None => Some(GradeChange::Added {
                    course: record.course.clone(),
                    grade: record.grade.clone(),
                }),
                Some(old) if old != record.grade => Some(GradeChange::Updated {
                    course: record.course.clone(),
                    previous: old.to_string(),
                    current: record.grade.clone(),
                }),
                Some(_) => None,
            }
        })
        .collect()
}

/// Stands in when the real notifier could not be set up, so the rest of the run still happens.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn notify(&self, _grades: &GradeSnapshot) -> bool {
        warn!("Notifier unavailable, change not announced");
        false
    }
}

/// One check: fetch, compare with the stored snapshot, and on change save and notify.
pub async fn run<S, N>(source: &S, store: &SnapshotStore, notifier: &N) -> RunOutcome
where
    S: GradeSource + ?Sized + Sync,
    N: Notifier + ?Sized + Sync,
{
    info!("Checking grades...");
    let current = source.fetch().await;

    // An empty fetch usually means the login failed; never let it wipe the snapshot.
    if current.is_empty() {
        info!("No grades fetched (login failure or no grades yet)");
        return RunOutcome::NothingFetched;
    }

    let previous = store.load();
    if compare(&previous, &current) == Comparison::Unchanged {
        info!("Grades unchanged");
        return RunOutcome::Unchanged;
    }

    info!("Grades changed! {} courses in total", current.len());
    for record in &current {
        info!("{} : {}", record.course, record.grade);
    }
    for change in diff_by_course(&previous, &current) {
        match change {
            GradeChange::Added { course, grade } => info!("New: {} -> {}", course, grade),
            GradeChange::Updated { course, previous, current } => {
                info!("Updated: {} {} -> {}", course, previous, current)
            }
        }
    }

    let saved = match store.save(&current) {
        Ok(()) => true,
        Err(e) => {
            error!("Failed to save grades to {}: {:#}", store.path().display(), e);
            false
        }
    };

    let notified = notifier.notify(&current).await;
    RunOutcome::Changed { courses: current.len(), saved, notified }
}
