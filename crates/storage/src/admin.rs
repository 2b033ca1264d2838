use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use shared::domain::{AuditLog, AuditStatus, Role, User};
use tokio::sync::RwLock;
use uuid::Uuid;

/// The built-in super administrator. Its role cannot be changed and it cannot
/// be removed.
pub const ROOT_USER_ID: &str = "1";
pub const PENDING_DESIGNATION: &str = "N/A (Pending Login)";

#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub actor_email: String,
    pub actor_name: String,
    pub action: String,
    pub details: String,
    pub status: AuditStatus,
}

impl NewAuditLog {
    pub fn new(
        actor_email: impl Into<String>,
        actor_name: impl Into<String>,
        action: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            actor_email: actor_email.into(),
            actor_name: actor_name.into(),
            action: action.into(),
            details: details.into(),
            status: AuditStatus::Success,
        }
    }

    pub fn with_status(mut self, status: AuditStatus) -> Self {
        self.status = status;
        self
    }

    pub(crate) fn into_entry(self, timestamp: DateTime<Utc>) -> AuditLog {
        AuditLog {
            id: format!("log-{}", Uuid::new_v4()),
            timestamp,
            actor_email: self.actor_email,
            actor_name: self.actor_name,
            action: self.action,
            details: self.details,
            status: self.status,
        }
    }
}

/// User directory and append-only audit trail behind the admin console.
#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>>;

    async fn find_user(&self, id: &str) -> Result<Option<User>>;

    /// Case-insensitive lookup.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Returns `None` when a user with that email already exists.
    async fn add_user(&self, email: &str, role: Role) -> Result<Option<User>>;

    async fn update_user_role(&self, id: &str, role: Role) -> Result<Option<User>>;

    async fn remove_user(&self, id: &str) -> Result<bool>;

    /// Refreshes the display name of a user after sign-in.
    async fn sync_profile(&self, email: &str, name: &str) -> Result<Option<User>>;

    /// Newest entry first.
    async fn list_audit_logs(&self) -> Result<Vec<AuditLog>>;

    async fn append_audit_log(&self, entry: NewAuditLog) -> Result<AuditLog>;
}

/// `first.last@corp` becomes `first last`.
pub fn display_name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    local.replacen('.', " ", 1)
}

pub(crate) fn new_user(email: &str, role: Role) -> User {
    User {
        id: format!("user-{}", Uuid::new_v4()),
        email: email.to_string(),
        name: display_name_from_email(email),
        role,
        designation: PENDING_DESIGNATION.to_string(),
        avatar: None,
    }
}

pub fn seed_users() -> Vec<User> {
    let user = |id: &str, name: &str, email: &str, role, designation: &str| User {
        id: id.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        role,
        designation: designation.to_string(),
        avatar: None,
    };
    vec![
        user(
            ROOT_USER_ID,
            "System Admin",
            "admin@example.com",
            Role::SuperAdmin,
            "Director, Internal Audit",
        ),
        user(
            "2",
            "John Doe",
            "john.doe@example.com",
            Role::Admin,
            "Senior Manager, Finance",
        ),
        user(
            "3",
            "Alice Smith",
            "alice.smith@example.com",
            Role::Viewer,
            "Analyst, Risk Management",
        ),
        user(
            "4",
            "Bob Jones",
            "bob.jones@example.com",
            Role::Viewer,
            "Associate, Controls",
        ),
    ]
}

pub fn seed_audit_logs(now: DateTime<Utc>) -> Vec<AuditLog> {
    vec![
        AuditLog {
            id: "1".into(),
            timestamp: now - Duration::days(1),
            actor_email: "admin@example.com".into(),
            actor_name: "System Admin".into(),
            action: "Uploaded Weekly Controls".into(),
            details: "105 records processed".into(),
            status: AuditStatus::Success,
        },
        AuditLog {
            id: "2".into(),
            timestamp: now - Duration::days(2),
            actor_email: "admin@example.com".into(),
            actor_name: "System Admin".into(),
            action: "User Access Update".into(),
            details: "Added 2 users".into(),
            status: AuditStatus::Success,
        },
    ]
}

#[derive(Debug, Default)]
struct AdminState {
    users: Vec<User>,
    audit_logs: Vec<AuditLog>,
}

/// Process-lifetime admin state. Lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryAdminStore {
    state: RwLock<AdminState>,
}

impl InMemoryAdminStore {
    pub fn new(users: Vec<User>, audit_logs: Vec<AuditLog>) -> Self {
        Self {
            state: RwLock::new(AdminState { users, audit_logs }),
        }
    }

    pub fn seeded() -> Self {
        Self::new(seed_users(), seed_audit_logs(Utc::now()))
    }
}

#[async_trait]
impl AdminStore for InMemoryAdminStore {
    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.state.read().await.users.clone())
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn add_user(&self, email: &str, role: Role) -> Result<Option<User>> {
        let mut state = self.state.write().await;
        if state
            .users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(email))
        {
            return Ok(None);
        }
        let user = new_user(email, role);
        state.users.push(user.clone());
        Ok(Some(user))
    }

    async fn update_user_role(&self, id: &str, role: Role) -> Result<Option<User>> {
        let mut state = self.state.write().await;
        let Some(user) = state.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.role = role;
        Ok(Some(user.clone()))
    }

    async fn remove_user(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.users.len();
        state.users.retain(|u| u.id != id);
        Ok(state.users.len() < before)
    }

    async fn sync_profile(&self, email: &str, name: &str) -> Result<Option<User>> {
        let mut state = self.state.write().await;
        let Some(user) = state
            .users
            .iter_mut()
            .find(|u| u.email.eq_ignore_ascii_case(email))
        else {
            return Ok(None);
        };
        user.name = name.to_string();
        Ok(Some(user.clone()))
    }

    async fn list_audit_logs(&self) -> Result<Vec<AuditLog>> {
        let mut logs = self.state.read().await.audit_logs.clone();
        // ties keep the later append first
        logs.reverse();
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(logs)
    }

    async fn append_audit_log(&self, entry: NewAuditLog) -> Result<AuditLog> {
        let log = entry.into_entry(Utc::now());
        self.state.write().await.audit_logs.push(log.clone());
        Ok(log)
    }
}

#[cfg(test)]
#[path = "tests/admin_tests.rs"]
mod tests;
