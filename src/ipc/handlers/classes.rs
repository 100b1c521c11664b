use crate::ipc::error::respond;
use crate::ipc::helpers::{db_conn, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{EnrollmentStatus, Role, User};
use crate::store::{
    ClassroomStore, EnrollmentFilter, NewClass, SqliteStore, StoreError, StoreResult,
};
use crate::timefmt::now_ts;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnrolledStudent {
    #[serde(flatten)]
    user: User,
    enrollment_status: EnrollmentStatus,
    enrolled_at: String,
}

fn classes_create(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    session.require_role(&[Role::Teacher, Role::HeadTeacher])?;

    let name = required_str(&req.params, "name")?.trim().to_string();
    let subject = required_str(&req.params, "subject")?.trim().to_string();
    let academic_year = required_str(&req.params, "academicYear")?.trim().to_string();
    let teacher_id = optional_str(&req.params, "teacherId")?
        .unwrap_or_else(|| session.user_id().to_string());
    if teacher_id != session.user_id() {
        session.require_role(&[Role::HeadTeacher])?;
    }

    let store = SqliteStore::new(conn);
    let Some(teacher) = store.get_user(&teacher_id)? else {
        return Err(StoreError::not_found("teacher"));
    };
    if teacher.role == Role::Student {
        return Err(StoreError::new("bad_params", "teacherId must name a teacher")
            .with_details(json!({ "param": "teacherId" })));
    }

    let class = store.insert_class(
        &NewClass {
            name,
            description: optional_str(&req.params, "description")?,
            subject,
            grade_level: optional_str(&req.params, "gradeLevel")?,
            academic_year,
            teacher_id,
        },
        &now_ts(),
    )?;
    tracing::info!(class_id = %class.id, teacher_id = %class.teacher_id, "class created");
    Ok(json!({ "class": class }))
}

/// Head teachers see every class, teachers their own, students the classes
/// they are actively enrolled in.
fn classes_list(state: &mut AppState, _req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let store = SqliteStore::new(conn);
    let classes = match session.role() {
        Role::HeadTeacher => store.list_classes()?,
        Role::Teacher => store.classes_by_teacher(session.user_id())?,
        Role::Student => {
            let ids: Vec<String> = store
                .read_enrollments(&EnrollmentFilter {
                    student_id: Some(session.user_id().to_string()),
                    status: Some(EnrollmentStatus::Active),
                    ..EnrollmentFilter::default()
                })?
                .into_iter()
                .map(|e| e.class_id)
                .collect();
            store.classes_by_ids(&ids)?
        }
    };
    Ok(json!({ "classes": classes }))
}

fn classes_get(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let class_id = required_str(&req.params, "classId")?;
    let store = SqliteStore::new(conn);
    let Some(class) = store.get_class(&class_id)? else {
        return Ok(json!({ "class": null, "students": [] }));
    };
    session.require_class_access(&store, &class_id)?;

    let enrollments = store.read_enrollments(&EnrollmentFilter {
        class_ids: Some(vec![class_id.clone()]),
        ..EnrollmentFilter::default()
    })?;
    let ids: Vec<String> = enrollments.iter().map(|e| e.student_id.clone()).collect();
    let mut users: HashMap<String, User> = store
        .users_by_ids(&ids)?
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();
    let students: Vec<EnrolledStudent> = enrollments
        .into_iter()
        .filter_map(|e| {
            users.remove(&e.student_id).map(|user| EnrolledStudent {
                user,
                enrollment_status: e.status,
                enrolled_at: e.enrolled_at,
            })
        })
        .collect();
    Ok(json!({ "class": class, "students": students }))
}

fn classes_delete(state: &mut AppState, req: &Request) -> StoreResult<Value> {
    let conn = db_conn(state.db.as_ref())?;
    let session = state.sessions.require()?;
    let class_id = required_str(&req.params, "classId")?;
    let store = SqliteStore::new(conn);
    session.require_class_owner(&store, &class_id)?;
    let deleted = store.delete_class(&class_id)?;
    tracing::info!(class_id = %class_id, "class deleted");
    Ok(json!({ "deleted": deleted }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "classes.create" => classes_create(state, req),
        "classes.list" => classes_list(state, req),
        "classes.get" => classes_get(state, req),
        "classes.delete" => classes_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
