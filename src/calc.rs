use crate::model::{AssignmentPoints, ScoreRow, SubmissionStatus};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Max points used when an assignment carries none (or a non-positive value).
pub const DEFAULT_MAX_POINTS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

impl LetterGrade {
    pub fn as_str(self) -> &'static str {
        match self {
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
        }
    }
}

/// Fixed step table; each band is closed at its lower bound.
pub fn letter_grade(average_score: f64) -> LetterGrade {
    if average_score >= 90.0 {
        LetterGrade::A
    } else if average_score >= 80.0 {
        LetterGrade::B
    } else if average_score >= 70.0 {
        LetterGrade::C
    } else if average_score >= 60.0 {
        LetterGrade::D
    } else {
        LetterGrade::F
    }
}

pub fn round_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn percent_of(score: f64, max_points: f64) -> f64 {
    let max = if max_points > 0.0 {
        max_points
    } else {
        DEFAULT_MAX_POINTS
    };
    score / max * 100.0
}

/// Arithmetic mean rounded to 2 decimals; `None` for an empty input.
pub fn mean_2_decimals<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut sum = 0.0_f64;
    let mut count = 0_usize;
    for v in values {
        sum += v;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(round_2_decimals(sum / count as f64))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub student_id: String,
    pub total_assignments: i64,
    pub completed_assignments: i64,
    pub average_score: f64,
    pub current_grade: LetterGrade,
}

/// Reduces one class's assignments and score rows to a summary per student.
///
/// Output follows the order of `student_ids`; students without rows still get
/// a (zeroed) summary. Each non-null score is turned into a percentage of its
/// own assignment's max points before averaging, so assignments weigh equally
/// regardless of their point totals. Rows for assignments outside
/// `assignments` are ignored.
pub fn aggregate_progress(
    assignments: &[AssignmentPoints],
    rows: &[ScoreRow],
    student_ids: &[String],
) -> Vec<ProgressSummary> {
    let max_by_assignment: HashMap<&str, f64> = assignments
        .iter()
        .map(|a| (a.id.as_str(), a.max_points))
        .collect();
    let total_assignments = assignments.len() as i64;

    // (completed, percent sum, graded count)
    let mut acc: HashMap<&str, (i64, f64, usize)> = HashMap::new();
    for row in rows {
        let Some(max_points) = max_by_assignment.get(row.assignment_id.as_str()).copied() else {
            continue;
        };
        let entry = acc.entry(row.student_id.as_str()).or_insert((0, 0.0, 0));
        if row.status == SubmissionStatus::Graded {
            entry.0 += 1;
        }
        if let Some(score) = row.score {
            entry.1 += percent_of(score, max_points);
            entry.2 += 1;
        }
    }

    student_ids
        .iter()
        .map(|sid| {
            let (completed, sum, graded) = acc.get(sid.as_str()).copied().unwrap_or((0, 0.0, 0));
            let average_score = if graded > 0 {
                round_2_decimals(sum / graded as f64)
            } else {
                0.0
            };
            ProgressSummary {
                student_id: sid.clone(),
                total_assignments,
                completed_assignments: completed,
                average_score,
                current_grade: letter_grade(average_score),
            }
        })
        .collect()
}

pub fn summarize_student(
    assignments: &[AssignmentPoints],
    rows: &[ScoreRow],
    student_id: &str,
) -> ProgressSummary {
    let ids = [student_id.to_string()];
    aggregate_progress(assignments, rows, &ids)
        .pop()
        .unwrap_or(ProgressSummary {
            student_id: student_id.to_string(),
            total_assignments: assignments.len() as i64,
            completed_assignments: 0,
            average_score: 0.0,
            current_grade: LetterGrade::F,
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRank {
    pub rank: usize,
    pub total: usize,
}

/// Orders `(student_id, average)` pairs best-first. Equal averages keep their
/// input order.
pub fn rank_by_average(entries: &[(String, f64)]) -> Vec<(usize, String, f64)> {
    let mut ordered: Vec<&(String, f64)> = entries.iter().collect();
    ordered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ordered
        .into_iter()
        .enumerate()
        .map(|(i, (sid, avg))| (i + 1, sid.clone(), *avg))
        .collect()
}

pub fn rank_of(entries: &[(String, f64)], student_id: &str) -> Option<ClassRank> {
    let total = entries.len();
    rank_by_average(entries)
        .into_iter()
        .find(|(_, sid, _)| sid == student_id)
        .map(|(rank, _, _)| ClassRank { rank, total })
}
