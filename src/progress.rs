use crate::calc::{self, ClassRank};
use crate::model::{AssignmentPoints, EnrollmentStatus, ProgressRow, ScoreRow};
use crate::store::{
    AssignmentFilter, ClassroomStore, EnrollmentFilter, ProgressFields, ProgressFilter,
    ProgressKey, ScoreFilter, StoreError, StoreResult,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

fn class_points<S>(store: &S, class_id: &str) -> StoreResult<Vec<AssignmentPoints>>
where
    S: ClassroomStore + ?Sized,
{
    let assignments = store.read_assignments(&AssignmentFilter::for_class(class_id))?;
    Ok(assignments.iter().map(AssignmentPoints::from).collect())
}

fn fields_from(summary: &calc::ProgressSummary, now: &str) -> ProgressFields {
    ProgressFields {
        total_assignments: summary.total_assignments,
        completed_assignments: summary.completed_assignments,
        average_score: summary.average_score,
        current_grade: summary.current_grade.as_str().to_string(),
        last_updated: now.to_string(),
    }
}

fn class_scores<S>(store: &S, class_id: &str, student_ids: Vec<String>) -> StoreResult<Vec<ScoreRow>>
where
    S: ClassroomStore + ?Sized,
{
    store.read_scores(&ScoreFilter {
        student_ids: Some(student_ids),
        class_id: Some(class_id.to_string()),
        ..ScoreFilter::default()
    })
}

/// Re-derives the (student, class) progress row from submissions and
/// overwrites the cached row. The student needs an enrollment row in the
/// class, whatever its status.
pub fn recompute_student_progress<S>(
    store: &S,
    student_id: &str,
    class_id: &str,
    now: &str,
) -> StoreResult<ProgressRow>
where
    S: ClassroomStore + ?Sized,
{
    let enrolled = store.read_enrollments(&EnrollmentFilter {
        student_id: Some(student_id.to_string()),
        class_ids: Some(vec![class_id.to_string()]),
        ..EnrollmentFilter::default()
    })?;
    if enrolled.is_empty() {
        return Err(StoreError::forbidden("student is not enrolled in this class"));
    }
    let points = class_points(store, class_id)?;
    let rows = class_scores(store, class_id, vec![student_id.to_string()])?;
    let summary = calc::summarize_student(&points, &rows, student_id);
    tracing::debug!(
        student_id,
        class_id,
        average = summary.average_score,
        grade = summary.current_grade.as_str(),
        "progress recomputed"
    );
    store.upsert_progress(
        &ProgressKey {
            student_id: student_id.to_string(),
            class_id: class_id.to_string(),
        },
        &fields_from(&summary, now),
    )
}

/// Recomputes every actively enrolled student of a class with one
/// assignment read and one score read.
pub fn recompute_class_progress<S>(store: &S, class_id: &str, now: &str) -> StoreResult<Vec<ProgressRow>>
where
    S: ClassroomStore + ?Sized,
{
    let student_ids = active_student_ids(store, class_id)?;
    let points = class_points(store, class_id)?;
    let rows = class_scores(store, class_id, student_ids.clone())?;

    let mut out = Vec::with_capacity(student_ids.len());
    for summary in calc::aggregate_progress(&points, &rows, &student_ids) {
        let key = ProgressKey {
            student_id: summary.student_id.clone(),
            class_id: class_id.to_string(),
        };
        out.push(store.upsert_progress(&key, &fields_from(&summary, now))?);
    }
    tracing::info!(class_id, students = out.len(), "class progress recomputed");
    Ok(out)
}

fn active_student_ids<S>(store: &S, class_id: &str) -> StoreResult<Vec<String>>
where
    S: ClassroomStore + ?Sized,
{
    Ok(store
        .read_enrollments(&EnrollmentFilter {
            class_ids: Some(vec![class_id.to_string()]),
            status: Some(EnrollmentStatus::Active),
            ..EnrollmentFilter::default()
        })?
        .into_iter()
        .map(|e| e.student_id)
        .collect())
}

pub fn student_progress<S>(store: &S, student_id: &str, class_id: &str) -> StoreResult<Option<ProgressRow>>
where
    S: ClassroomStore + ?Sized,
{
    Ok(store
        .read_progress(&ProgressFilter {
            student_id: Some(student_id.to_string()),
            class_id: Some(class_id.to_string()),
        })?
        .into_iter()
        .next())
}

/// Position of a student among the cached progress rows of the class's
/// active students. Ties keep stored row order. `None` when the student has
/// no such row.
pub fn student_ranking<S>(store: &S, student_id: &str, class_id: &str) -> StoreResult<Option<ClassRank>>
where
    S: ClassroomStore + ?Sized,
{
    let active: HashSet<String> = active_student_ids(store, class_id)?.into_iter().collect();
    let rows = store.read_progress(&ProgressFilter {
        class_id: Some(class_id.to_string()),
        ..ProgressFilter::default()
    })?;
    let entries: Vec<(String, f64)> = rows
        .into_iter()
        .filter(|r| active.contains(&r.student_id))
        .map(|r| (r.student_id, r.average_score))
        .collect();
    Ok(calc::rank_of(&entries, student_id))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAverage {
    pub student_id: String,
    pub name: String,
    pub average_score: f64,
    pub total_assignments: i64,
}

/// Live per-student averages for a class, computed from submissions rather
/// than the cache.
pub fn class_averages<S>(store: &S, class_id: &str) -> StoreResult<Vec<ClassAverage>>
where
    S: ClassroomStore + ?Sized,
{
    let student_ids = active_student_ids(store, class_id)?;
    if student_ids.is_empty() {
        return Ok(Vec::new());
    }
    let points = class_points(store, class_id)?;
    let rows = class_scores(store, class_id, student_ids.clone())?;
    let names: HashMap<String, String> = store
        .users_by_ids(&student_ids)?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();

    Ok(calc::aggregate_progress(&points, &rows, &student_ids)
        .into_iter()
        .map(|s| ClassAverage {
            name: names
                .get(&s.student_id)
                .cloned()
                .unwrap_or_else(|| "Unknown Student".to_string()),
            student_id: s.student_id,
            average_score: s.average_score,
            total_assignments: s.total_assignments,
        })
        .collect())
}

/// Mean raw grade of one assignment over graded rows; `None` when nothing
/// has a grade yet.
pub fn assignment_average<S>(store: &S, assignment_id: &str) -> StoreResult<Option<f64>>
where
    S: ClassroomStore + ?Sized,
{
    let rows = store.read_scores(&ScoreFilter {
        assignment_ids: Some(vec![assignment_id.to_string()]),
        ..ScoreFilter::default()
    })?;
    Ok(calc::mean_2_decimals(rows.into_iter().filter_map(|r| r.score)))
}
