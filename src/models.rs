use serde::{Deserialize, Serialize};

/// Column key the portal uses for the course name cell.
pub const COURSE_COLUMN: &str = "tabGrid_kcmc";
/// Column key the portal uses for the grade cell.
pub const GRADE_COLUMN: &str = "tabGrid_cj";

/// One row of the grade table. Both values are kept as text since grades can be
/// numeric ("90") or letter based ("优秀").
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct GradeRecord {
    #[serde(rename = "tabGrid_kcmc", default)]
    pub course: String,
    #[serde(rename = "tabGrid_cj", default)]
    pub grade: String,
}

impl GradeRecord {
    pub fn new(course: impl Into<String>, grade: impl Into<String>) -> Self {
        Self { course: course.into(), grade: grade.into() }
    }
}

/// Rows in the order the portal listed them.
pub type GradeSnapshot = Vec<GradeRecord>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Unchanged,
    Changed,
}

/// A course whose grade appeared or moved since the previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GradeChange {
    Added { course: String, grade: String },
    Updated { course: String, previous: String, current: String },
}

/// What a single check ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    NothingFetched,
    Unchanged,
    Changed { courses: usize, saved: bool, notified: bool },
}

impl RunOutcome {
    /// Process exit status. Without `strict` every run exits 0 so a scheduler never sees a
    /// failure; with it, 2 = nothing fetched, 3 = not announced, 4 = snapshot not saved.
    pub fn exit_status(&self, strict: bool) -> u8 {
        if !strict {
            return 0;
        }
        match self {
            RunOutcome::Unchanged => 0,
            RunOutcome::NothingFetched => 2,
            // An unsaved snapshot means the next run announces the same change again.
            RunOutcome::Changed { saved: false, .. } => 4,
            RunOutcome::Changed { notified: false, .. } => 3,
            RunOutcome::Changed { .. } => 0,
        }
    }
}
