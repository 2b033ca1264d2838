use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use mailer::Mailer;
use serde_json::json;
use storage::{seed::mock_controls, AdminStore, ControlStore, InMemoryAdminStore};

use super::*;

struct RecordingMailer {
    outcome: Delivery,
    sent: Mutex<Vec<OutboundEmail>>,
}

impl RecordingMailer {
    fn new(outcome: Delivery) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            sent: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<Delivery, MailError> {
        if email.recipients().is_empty() {
            return Err(MailError::NoRecipients);
        }
        self.sent.lock().expect("lock").push(email.clone());
        Ok(self.outcome)
    }
}

fn context_with(outcome: Delivery) -> (ApiContext, Arc<RecordingMailer>) {
    let mailer = RecordingMailer::new(outcome);
    let ctx = ApiContext {
        controls: ControlStore::new(mock_controls(5, 1)).expect("controls"),
        admin: Arc::new(InMemoryAdminStore::seeded()),
        mailer: mailer.clone(),
        dashboard_url: "https://sox.example.com".into(),
    };
    (ctx, mailer)
}

fn context() -> ApiContext {
    context_with(Delivery::Sent).0
}

fn caller(email: &str, name: &str, role: Role) -> Caller {
    Caller {
        email: email.into(),
        name: name.into(),
        role,
    }
}

fn super_admin() -> Caller {
    caller("admin@example.com", "System Admin", Role::SuperAdmin)
}

fn admin() -> Caller {
    caller("john.doe@example.com", "John Doe", Role::Admin)
}

fn viewer() -> Caller {
    caller("alice.smith@example.com", "Alice Smith", Role::Viewer)
}

async fn latest_log(ctx: &ApiContext) -> AuditLog {
    ctx.admin
        .list_audit_logs()
        .await
        .expect("logs")
        .into_iter()
        .next()
        .expect("at least one log")
}

fn assert_code(err: ApiError, code: ErrorCode) {
    assert_eq!(err.code, code, "unexpected error: {}", err.message);
}

#[tokio::test]
async fn contact_lists_expose_admins_only() {
    let ctx = context();
    let contacts = contacts(&ctx).await.expect("contacts");
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].email, "admin@example.com");

    let support = support_contacts(&ctx).await.expect("support");
    let emails: Vec<&str> = support.iter().map(|c| c.email.as_str()).collect();
    assert_eq!(emails, vec!["admin@example.com", "john.doe@example.com"]);
}

#[tokio::test]
async fn viewers_cannot_use_admin_operations() {
    let ctx = context();
    assert_code(
        list_users(&ctx, &viewer()).await.expect_err("forbidden"),
        ErrorCode::Forbidden,
    );
    assert_code(
        list_audit_logs(&ctx, &viewer()).await.expect_err("forbidden"),
        ErrorCode::Forbidden,
    );
    assert_code(template(&viewer()).expect_err("forbidden"), ErrorCode::Forbidden);
    assert_eq!(list_users(&ctx, &admin()).await.expect("users").len(), 4);
}

#[tokio::test]
async fn add_users_requires_an_array_of_strings() {
    let ctx = context();
    for emails in [None, Some(json!("a@example.com")), Some(json!([1, 2]))] {
        let err = add_users(
            &ctx,
            &super_admin(),
            AddUsersRequest { emails, role: None },
        )
        .await
        .expect_err("invalid");
        assert_code(err.clone(), ErrorCode::Validation);
        assert_eq!(err.message, "Invalid emails array");
    }
}

#[tokio::test]
async fn add_users_creates_viewers_and_sends_welcome_mail() {
    let (ctx, mailer) = context_with(Delivery::Sent);
    let res = add_users(
        &ctx,
        &admin(),
        AddUsersRequest {
            emails: Some(json!([
                "new.analyst@example.com",
                "ALICE.SMITH@example.com",
                "not-an-email",
                "  "
            ])),
            role: None,
        },
    )
    .await
    .expect("add");

    assert_eq!(res.message, "Added 1 users");
    assert_eq!(res.users.len(), 1);
    assert_eq!(res.users[0].role, Role::Viewer);
    assert_eq!(res.users[0].name, "new analyst");
    assert_eq!(res.skipped, vec!["ALICE.SMITH@example.com", "not-an-email"]);

    let log = latest_log(&ctx).await;
    assert_eq!(log.action, "User Added");
    assert_eq!(log.actor_email, "john.doe@example.com");

    let mut sent = mailer.sent();
    for _ in 0..50 {
        if !sent.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        sent = mailer.sent();
    }
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "new.analyst@example.com");
    assert_eq!(sent[0].subject, templates::WELCOME_SUBJECT);
    assert!(sent[0].html.contains("https://sox.example.com"));
}

#[tokio::test]
async fn admins_cannot_grant_admin_roles() {
    let ctx = context();
    let err = add_users(
        &ctx,
        &admin(),
        AddUsersRequest {
            emails: Some(json!(["x@example.com"])),
            role: Some("Admin".into()),
        },
    )
    .await
    .expect_err("forbidden");
    assert_code(err, ErrorCode::Forbidden);

    let err = update_user_role(
        &ctx,
        &admin(),
        "3",
        UpdateRoleRequest {
            role: Some("Super Admin".into()),
        },
    )
    .await
    .expect_err("forbidden");
    assert_code(err, ErrorCode::Forbidden);
}

#[tokio::test]
async fn super_admin_can_promote_but_not_touch_root() {
    let ctx = context();
    let user = update_user_role(
        &ctx,
        &super_admin(),
        "3",
        UpdateRoleRequest {
            role: Some("Admin".into()),
        },
    )
    .await
    .expect("promote");
    assert_eq!(user.role, Role::Admin);
    let log = latest_log(&ctx).await;
    assert_eq!(log.action, "User Role Updated");
    assert_eq!(log.details, "Changed alice.smith@example.com from Viewer to Admin");

    let err = update_user_role(
        &ctx,
        &super_admin(),
        "1",
        UpdateRoleRequest {
            role: Some("Viewer".into()),
        },
    )
    .await
    .expect_err("root");
    assert_code(err, ErrorCode::Forbidden);
}

#[tokio::test]
async fn admins_only_manage_viewers() {
    let ctx = context();
    let err = remove_user(&ctx, &admin(), "1").await.expect_err("root");
    assert_code(err, ErrorCode::Forbidden);

    let other_admin = caller("second.admin@example.com", "Second Admin", Role::Admin);
    let err = remove_user(&ctx, &other_admin, "2").await.expect_err("admin");
    assert_code(err, ErrorCode::Forbidden);

    remove_user(&ctx, &admin(), "4").await.expect("remove viewer");
}

#[tokio::test]
async fn role_update_validates_input() {
    let ctx = context();
    let err = update_user_role(&ctx, &super_admin(), "3", UpdateRoleRequest { role: None })
        .await
        .expect_err("missing");
    assert_eq!(err.message, "Missing role");

    let err = update_user_role(
        &ctx,
        &super_admin(),
        "3",
        UpdateRoleRequest {
            role: Some("Owner".into()),
        },
    )
    .await
    .expect_err("unknown role");
    assert_code(err, ErrorCode::Validation);

    let err = update_user_role(
        &ctx,
        &super_admin(),
        "missing",
        UpdateRoleRequest {
            role: Some("Viewer".into()),
        },
    )
    .await
    .expect_err("missing user");
    assert_code(err.clone(), ErrorCode::NotFound);
    assert_eq!(err.message, "User not found");
}

#[tokio::test]
async fn remove_user_refuses_self_and_reports_missing_users() {
    let ctx = context();
    let err = remove_user(&ctx, &super_admin(), "1").await.expect_err("self");
    assert_code(err, ErrorCode::Forbidden);

    let res = remove_user(&ctx, &super_admin(), "4").await.expect("remove");
    assert_eq!(res.message, "User removed");
    let log = latest_log(&ctx).await;
    assert_eq!(log.action, "User Removed");

    let err = remove_user(&ctx, &super_admin(), "4")
        .await
        .expect_err("gone");
    assert_code(err, ErrorCode::NotFound);
}

#[tokio::test]
async fn sync_profile_updates_own_name() {
    let ctx = context();
    let err = sync_profile(
        &ctx,
        &viewer(),
        SyncProfileRequest {
            email: Some("alice.smith@example.com".into()),
            name: None,
        },
    )
    .await
    .expect_err("missing name");
    assert_eq!(err.message, "Missing email or name");

    let err = sync_profile(
        &ctx,
        &viewer(),
        SyncProfileRequest {
            email: Some("bob.jones@example.com".into()),
            name: Some("Robert Jones".into()),
        },
    )
    .await
    .expect_err("someone else");
    assert_code(err, ErrorCode::Forbidden);

    let res = sync_profile(
        &ctx,
        &viewer(),
        SyncProfileRequest {
            email: Some("alice.smith@example.com".into()),
            name: Some("Alice M. Smith".into()),
        },
    )
    .await
    .expect("sync");
    assert!(res.success);
    assert_eq!(res.user.name, "Alice M. Smith");
}

#[tokio::test]
async fn send_email_requires_fields() {
    let ctx = context();
    let err = send_email(
        &ctx,
        &admin(),
        SendEmailRequest {
            to: Some("a@example.com".into()),
            subject: Some(" ".into()),
            body: Some("hello".into()),
            event_id: None,
            sender_email: None,
        },
    )
    .await
    .expect_err("missing subject");
    assert_code(err.clone(), ErrorCode::Validation);
    assert_eq!(err.message, "Missing required fields: to, subject, body");
}

#[tokio::test]
async fn sent_email_is_audited_as_success() {
    let (ctx, mailer) = context_with(Delivery::Sent);
    let res = send_email(
        &ctx,
        &admin(),
        SendEmailRequest {
            to: Some("owner@example.com".into()),
            subject: Some("Certification due".into()),
            body: Some("Please certify <CTL-1000>\nThanks".into()),
            event_id: Some("CTL-1000".into()),
            sender_email: None,
        },
    )
    .await
    .expect("send");
    assert!(res.success);
    assert_eq!(res.message, EMAIL_SENT_MESSAGE);

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].html.contains("Please certify &lt;CTL-1000&gt;<br/>Thanks"));

    let log = latest_log(&ctx).await;
    assert_eq!(log.action, "Email Sent");
    assert_eq!(log.status, AuditStatus::Success);
    assert_eq!(log.actor_email, "john.doe@example.com");
    assert_eq!(
        log.details,
        "Reminder email sent to owner@example.com for event CTL-1000: Certification due"
    );
}

#[tokio::test]
async fn skipped_email_reports_queued_and_audits_error() {
    let (ctx, _mailer) = context_with(Delivery::Skipped);
    let res = send_email(
        &ctx,
        &admin(),
        SendEmailRequest {
            to: Some("owner@example.com".into()),
            subject: Some("Certification due".into()),
            body: Some("Reminder".into()),
            event_id: None,
            sender_email: Some("sender@example.com".into()),
        },
    )
    .await
    .expect("send");
    assert!(!res.success);
    assert_eq!(res.message, EMAIL_QUEUED_MESSAGE);

    let log = latest_log(&ctx).await;
    assert_eq!(log.status, AuditStatus::Error);
    assert_eq!(log.actor_email, "sender@example.com");
}

#[tokio::test]
async fn ingest_replaces_the_collection() {
    let ctx = context();
    let rows = serde_json::to_value(mock_controls(12, 99)).expect("rows");
    let res = ingest(&ctx, &admin(), IngestRequest { data: Some(rows) })
        .await
        .expect("ingest");
    assert_eq!(res.message, "Ingestion successful");
    assert_eq!(res.count, 12);
    assert_eq!(ctx.controls.snapshot().len(), 12);

    let log = latest_log(&ctx).await;
    assert_eq!(log.action, "Uploaded Weekly Controls");
    assert_eq!(log.details, "12 records processed");
    assert_eq!(log.status, AuditStatus::Success);
}

#[tokio::test]
async fn invalid_ingest_keeps_the_previous_collection() {
    let ctx = context();

    let mut rows = serde_json::to_value(mock_controls(3, 99)).expect("rows");
    rows[1]["Status"] = json!("Maybe");
    let err = ingest(&ctx, &admin(), IngestRequest { data: Some(rows) })
        .await
        .expect_err("invalid row");
    assert_code(err.clone(), ErrorCode::Validation);
    assert!(err.message.starts_with("Invalid control at row 1"));
    let log = latest_log(&ctx).await;
    assert_eq!(log.status, AuditStatus::Error);

    let mut rows = serde_json::to_value(mock_controls(3, 99)).expect("rows");
    rows[2]["ControlId"] = json!("CTL-1000");
    let err = ingest(&ctx, &admin(), IngestRequest { data: Some(rows) })
        .await
        .expect_err("duplicate");
    assert!(err.message.contains("CTL-1000"));

    let err = ingest(&ctx, &admin(), IngestRequest { data: Some(json!([])) })
        .await
        .expect_err("empty");
    assert_code(err, ErrorCode::Validation);

    assert_eq!(ctx.controls.snapshot().len(), 5);
}

#[tokio::test]
async fn viewers_cannot_ingest() {
    let ctx = context();
    let rows = serde_json::to_value(mock_controls(2, 1)).expect("rows");
    let err = ingest(&ctx, &viewer(), IngestRequest { data: Some(rows) })
        .await
        .expect_err("forbidden");
    assert_code(err, ErrorCode::Forbidden);
    assert_eq!(ctx.controls.snapshot().len(), 5);
}

#[test]
fn template_lists_ingest_columns() {
    let csv = template(&admin()).expect("template");
    assert!(csv.starts_with("ControlId,BusinessUnit,ProcessName,ProcessId,ControlTitle,"));
    assert!(csv.trim_end().ends_with("ORE_Number,ORE_Title,ORE_Owner"));
}
