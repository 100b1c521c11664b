use crate::model::{EnrollmentStatus, Role, User};
use crate::store::{ClassroomStore, EnrollmentFilter, StoreError, StoreResult};
use serde::Serialize;

/// Signed-in user plus the profile row resolved when the session opened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: User,
    pub opened_at: String,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn is_head_teacher(&self) -> bool {
        self.user.role == Role::HeadTeacher
    }

    pub fn is_staff(&self) -> bool {
        matches!(self.user.role, Role::Teacher | Role::HeadTeacher)
    }

    pub fn require_role(&self, allowed: &[Role]) -> StoreResult<()> {
        if allowed.contains(&self.user.role) {
            return Ok(());
        }
        let names: Vec<&str> = allowed.iter().map(|r| r.as_str()).collect();
        Err(StoreError::forbidden(format!(
            "requires role: {}",
            names.join(" or ")
        )))
    }

    /// Head teachers see every class, teachers the ones they own, students
    /// the ones they are actively enrolled in.
    pub fn can_view_class<S>(&self, store: &S, class_id: &str) -> StoreResult<bool>
    where
        S: ClassroomStore + ?Sized,
    {
        match self.user.role {
            Role::HeadTeacher => Ok(true),
            Role::Teacher => Ok(store
                .classes_by_ids(&[class_id.to_string()])?
                .iter()
                .any(|c| c.teacher_id == self.user.id)),
            Role::Student => Ok(!store
                .read_enrollments(&EnrollmentFilter {
                    student_id: Some(self.user.id.clone()),
                    class_ids: Some(vec![class_id.to_string()]),
                    status: Some(EnrollmentStatus::Active),
                })?
                .is_empty()),
        }
    }

    pub fn require_class_access<S>(&self, store: &S, class_id: &str) -> StoreResult<()>
    where
        S: ClassroomStore + ?Sized,
    {
        if self.can_view_class(store, class_id)? {
            return Ok(());
        }
        Err(StoreError::forbidden("no access to this class"))
    }

    /// Staff write access: head teachers anywhere, teachers only in classes
    /// they own.
    pub fn require_class_owner<S>(&self, store: &S, class_id: &str) -> StoreResult<()>
    where
        S: ClassroomStore + ?Sized,
    {
        self.require_role(&[Role::Teacher, Role::HeadTeacher])?;
        let Some(class) = store.classes_by_ids(&[class_id.to_string()])?.into_iter().next() else {
            return Err(StoreError::not_found("class"));
        };
        if self.is_head_teacher() || class.teacher_id == self.user.id {
            return Ok(());
        }
        Err(StoreError::forbidden("only the class teacher can do this"))
    }

    /// Passes for the user themself or a head teacher.
    pub fn require_self_or_head(&self, user_id: &str) -> StoreResult<()> {
        if self.user.id == user_id || self.is_head_teacher() {
            return Ok(());
        }
        Err(StoreError::forbidden("not allowed to act for another user"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn(Session),
    SignedOut { user_id: String },
}

pub type SubscriptionId = u64;

type Listener = Box<dyn Fn(&SessionEvent)>;

/// Owns the current session. Callers hold this explicitly and pass the
/// resolved `Session` into services; there is no ambient "current user".
pub struct SessionManager {
    current: Option<Session>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: SubscriptionId,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            current: None,
            listeners: Vec::new(),
            next_id: 1,
        }
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn require(&self) -> StoreResult<&Session> {
        self.current
            .as_ref()
            .ok_or_else(|| StoreError::new("no_session", "open a session first"))
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    /// Resolves the profile row for `user_id` and makes it the current
    /// session. An already-open session is closed first.
    pub fn open<S>(&mut self, store: &S, user_id: &str, now: &str) -> StoreResult<Session>
    where
        S: ClassroomStore + ?Sized,
    {
        let Some(user) = store.get_user(user_id)? else {
            return Err(StoreError::not_found("user"));
        };
        self.close();
        let session = Session {
            user,
            opened_at: now.to_string(),
        };
        self.current = Some(session.clone());
        self.emit(&SessionEvent::SignedIn(session.clone()));
        Ok(session)
    }

    /// Re-reads the profile of the signed-in user. A profile that vanished
    /// closes the session.
    pub fn refresh<S>(&mut self, store: &S) -> StoreResult<Option<Session>>
    where
        S: ClassroomStore + ?Sized,
    {
        let Some(current) = self.current.as_ref() else {
            return Ok(None);
        };
        match store.get_user(&current.user.id)? {
            Some(user) => {
                let updated = Session {
                    user,
                    opened_at: current.opened_at.clone(),
                };
                self.current = Some(updated.clone());
                Ok(Some(updated))
            }
            None => {
                self.close();
                Ok(None)
            }
        }
    }

    pub fn close(&mut self) -> bool {
        let Some(prev) = self.current.take() else {
            return false;
        };
        self.emit(&SessionEvent::SignedOut {
            user_id: prev.user.id,
        });
        true
    }

    fn emit(&self, event: &SessionEvent) {
        for (_, listener) in &self.listeners {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::store::{NewUser, SqliteStore};
    use rusqlite::Connection;
    use std::cell::RefCell;
    use std::rc::Rc;

    const NOW: &str = "2026-01-10T09:00:00.000Z";

    #[test]
    fn listeners_see_sign_in_and_out_until_unsubscribed() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("schema");
        let store = SqliteStore::new(&conn);
        let user = store
            .insert_user(
                &NewUser {
                    email: "ht@school.test".into(),
                    name: "Head".into(),
                    role: Role::HeadTeacher,
                    class_id: None,
                },
                NOW,
            )
            .expect("user");

        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let mut sessions = SessionManager::new();
        let sink = Rc::clone(&seen);
        let sub = sessions.subscribe(move |ev| {
            let tag = match ev {
                SessionEvent::SignedIn(s) => format!("in:{}", s.user.name),
                SessionEvent::SignedOut { .. } => "out".to_string(),
            };
            sink.borrow_mut().push(tag);
        });

        let session = sessions.open(&store, &user.id, NOW).expect("open");
        assert!(session.is_head_teacher());
        assert!(sessions.close());
        assert!(!sessions.close());
        assert!(sessions.unsubscribe(sub));
        assert!(!sessions.unsubscribe(sub));
        sessions.open(&store, &user.id, NOW).expect("reopen");

        assert_eq!(*seen.borrow(), vec!["in:Head".to_string(), "out".to_string()]);
        assert_eq!(sessions.subscriber_count(), 0);
    }

    #[test]
    fn unknown_user_cannot_open_a_session() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("schema");
        let store = SqliteStore::new(&conn);
        let mut sessions = SessionManager::new();
        let e = sessions.open(&store, "nobody", NOW).expect_err("missing user");
        assert_eq!(e.code, "not_found");
        assert_eq!(sessions.require().expect_err("no session").code, "no_session");
    }
}
