//! Role dashboards. Each composer issues several independent store reads and
//! folds them into one payload. The reads share no snapshot, and the first
//! failing read fails the whole composition.

use crate::calc;
use crate::model::{Assignment, EnrollmentStatus, ProgressRow, Role, SubmissionStatus};
use crate::session::Session;
use crate::store::{
    AssignmentFilter, ClassroomStore, EnrollmentFilter, ProgressFilter, ScoreFilter, StoreResult,
};
use crate::timefmt::format_ts;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub const DASHBOARD_LIST_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentWithClass {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherDashboard {
    pub teacher_id: String,
    pub total_classes: usize,
    pub total_students: usize,
    /// Every assignment across the teacher's classes. This is not capped at
    /// the length of `recent_assignments`.
    pub total_assignments: usize,
    pub submissions_needing_grading: usize,
    pub recent_assignments: Vec<AssignmentWithClass>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentGrade {
    pub submission_id: String,
    pub grade: Option<f64>,
    pub graded_at: Option<String>,
    pub assignment: Option<AssignmentWithClass>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassProgress {
    #[serde(flatten)]
    pub progress: ProgressRow,
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDashboard {
    pub student_id: String,
    pub total_classes: usize,
    pub overall_average: f64,
    pub upcoming_assignments: Vec<AssignmentWithClass>,
    pub recent_grades: Vec<RecentGrade>,
    pub class_progress: Vec<ClassProgress>,
}

fn with_class(assignment: Assignment, names: &HashMap<String, String>) -> AssignmentWithClass {
    let class_name = names.get(&assignment.class_id).cloned();
    AssignmentWithClass {
        assignment,
        class_name,
    }
}

pub fn compose_teacher_dashboard<S>(
    store: &S,
    session: &Session,
    teacher_id: &str,
) -> StoreResult<TeacherDashboard>
where
    S: ClassroomStore + ?Sized,
{
    session.require_role(&[Role::Teacher, Role::HeadTeacher])?;
    session.require_self_or_head(teacher_id)?;

    let classes = store.classes_by_teacher(teacher_id)?;
    let class_ids: Vec<String> = classes.iter().map(|c| c.id.clone()).collect();
    let names: HashMap<String, String> = classes
        .iter()
        .map(|c| (c.id.clone(), c.name.clone()))
        .collect();

    let total_students = if class_ids.is_empty() {
        0
    } else {
        store
            .read_enrollments(&EnrollmentFilter {
                class_ids: Some(class_ids.clone()),
                ..EnrollmentFilter::default()
            })?
            .len()
    };

    let assignments = store.read_assignments(&AssignmentFilter {
        class_ids: Some(class_ids),
        ..AssignmentFilter::default()
    })?;
    let total_assignments = assignments.len();
    let recent: Vec<Assignment> = assignments
        .into_iter()
        .take(DASHBOARD_LIST_LIMIT)
        .collect();

    let recent_ids: Vec<String> = recent.iter().map(|a| a.id.clone()).collect();
    let submissions_needing_grading = if recent_ids.is_empty() {
        0
    } else {
        store
            .read_scores(&ScoreFilter {
                assignment_ids: Some(recent_ids),
                status: Some(SubmissionStatus::Submitted),
                ..ScoreFilter::default()
            })?
            .len()
    };

    tracing::debug!(
        teacher_id,
        classes = classes.len(),
        total_students,
        submissions_needing_grading,
        "teacher dashboard composed"
    );

    Ok(TeacherDashboard {
        teacher_id: teacher_id.to_string(),
        total_classes: classes.len(),
        total_students,
        total_assignments,
        submissions_needing_grading,
        recent_assignments: recent.into_iter().map(|a| with_class(a, &names)).collect(),
    })
}

pub fn compose_student_dashboard<S>(
    store: &S,
    session: &Session,
    student_id: &str,
    now: DateTime<Utc>,
) -> StoreResult<StudentDashboard>
where
    S: ClassroomStore + ?Sized,
{
    session.require_self_or_head(student_id)?;

    let enrollments = store.read_enrollments(&EnrollmentFilter {
        student_id: Some(student_id.to_string()),
        status: Some(EnrollmentStatus::Active),
        ..EnrollmentFilter::default()
    })?;
    let enrolled_ids: Vec<String> = enrollments.iter().map(|e| e.class_id.clone()).collect();

    let upcoming = if enrolled_ids.is_empty() {
        Vec::new()
    } else {
        store.read_assignments(&AssignmentFilter {
            class_ids: Some(enrolled_ids.clone()),
            due_from: Some(format_ts(now)),
            limit: Some(DASHBOARD_LIST_LIMIT),
            ..AssignmentFilter::default()
        })?
    };

    let graded = store.recent_graded_submissions(student_id, DASHBOARD_LIST_LIMIT)?;
    let graded_assignments: HashMap<String, Assignment> = if graded.is_empty() {
        HashMap::new()
    } else {
        store
            .read_assignments(&AssignmentFilter {
                ids: Some(graded.iter().map(|s| s.assignment_id.clone()).collect()),
                ..AssignmentFilter::default()
            })?
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect()
    };

    let progress = store.read_progress(&ProgressFilter {
        student_id: Some(student_id.to_string()),
        ..ProgressFilter::default()
    })?;

    // One lookup resolves every class name the payload mentions.
    let mut seen: HashSet<String> = HashSet::new();
    let mut class_ids: Vec<String> = Vec::new();
    let mentioned = enrolled_ids
        .iter()
        .cloned()
        .chain(graded_assignments.values().map(|a| a.class_id.clone()))
        .chain(progress.iter().map(|p| p.class_id.clone()));
    for id in mentioned {
        if seen.insert(id.clone()) {
            class_ids.push(id);
        }
    }
    let names: HashMap<String, String> = store
        .classes_by_ids(&class_ids)?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    let overall_average =
        calc::mean_2_decimals(progress.iter().map(|p| p.average_score)).unwrap_or(0.0);

    let recent_grades = graded
        .into_iter()
        .map(|s| RecentGrade {
            assignment: graded_assignments
                .get(&s.assignment_id)
                .cloned()
                .map(|a| with_class(a, &names)),
            submission_id: s.id,
            grade: s.grade,
            graded_at: s.graded_at,
        })
        .collect();

    let class_progress = progress
        .into_iter()
        .map(|p| ClassProgress {
            class_name: names.get(&p.class_id).cloned(),
            progress: p,
        })
        .collect();

    Ok(StudentDashboard {
        student_id: student_id.to_string(),
        total_classes: enrollments.len(),
        overall_average,
        upcoming_assignments: upcoming.into_iter().map(|a| with_class(a, &names)).collect(),
        recent_grades,
        class_progress,
    })
}
