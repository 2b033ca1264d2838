use std::str::FromStr;

use mailer::{templates, Delivery, MailError, Mailer, OutboundEmail};
use shared::{
    domain::{AuditLog, AuditStatus, Control, Role, User, CONTROL_TEMPLATE_COLUMNS},
    error::{ApiError, ErrorCode},
    protocol::{
        AddUsersRequest, AddUsersResponse, ContactCard, IngestRequest, IngestResponse,
        MessageResponse, SendEmailRequest, SendEmailResponse, SyncProfileRequest,
        SyncProfileResponse, UpdateRoleRequest,
    },
};
use storage::{AdminStore, NewAuditLog};
use tracing::{info, warn};

use super::{internal, ApiContext};
use crate::auth::{ensure_can_grant, ensure_can_manage, require_admin, Caller};

pub const EMAIL_SENT_MESSAGE: &str = "Email sent successfully";
pub const EMAIL_QUEUED_MESSAGE: &str = "Email queued (mock mode or credentials missing)";
pub const TEMPLATE_FILENAME: &str = "controls_template.csv";

const INGEST_ACTION: &str = "Uploaded Weekly Controls";

/// Super Admins, shown on the access-denied page.
pub async fn contacts(ctx: &ApiContext) -> Result<Vec<ContactCard>, ApiError> {
    contact_cards(ctx, |role| role == Role::SuperAdmin).await
}

/// Everyone who can help with access: Super Admins and Admins.
pub async fn support_contacts(ctx: &ApiContext) -> Result<Vec<ContactCard>, ApiError> {
    contact_cards(ctx, Role::is_admin).await
}

async fn contact_cards(
    ctx: &ApiContext,
    include: impl Fn(Role) -> bool,
) -> Result<Vec<ContactCard>, ApiError> {
    let users = ctx
        .admin
        .list_users()
        .await
        .map_err(|e| internal("Failed to fetch contacts", e))?;
    Ok(users
        .into_iter()
        .filter(|user| include(user.role))
        .map(ContactCard::from)
        .collect())
}

pub async fn list_users(ctx: &ApiContext, caller: &Caller) -> Result<Vec<User>, ApiError> {
    require_admin(caller)?;
    ctx.admin
        .list_users()
        .await
        .map_err(|e| internal("Failed to fetch users", e))
}

fn parse_role(raw: &str) -> Result<Role, ApiError> {
    Role::from_str(raw.trim()).map_err(|_| ApiError::validation(format!("Invalid role '{raw}'")))
}

pub async fn add_users(
    ctx: &ApiContext,
    caller: &Caller,
    req: AddUsersRequest,
) -> Result<AddUsersResponse, ApiError> {
    require_admin(caller)?;
    let emails = req
        .emails
        .as_ref()
        .and_then(|value| value.as_array())
        .and_then(|items| {
            items
                .iter()
                .map(|item| item.as_str().map(str::trim))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| ApiError::validation("Invalid emails array"))?;
    let role = match req.role.as_deref().filter(|r| !r.trim().is_empty()) {
        Some(raw) => parse_role(raw)?,
        None => Role::Viewer,
    };
    ensure_can_grant(caller, role)?;

    let mut users = Vec::new();
    let mut skipped = Vec::new();
    for email in emails {
        if email.is_empty() {
            continue;
        }
        if !email.contains('@') {
            skipped.push(email.to_string());
            continue;
        }
        let Some(user) = ctx
            .admin
            .add_user(email, role)
            .await
            .map_err(|e| internal("Failed to add users", e))?
        else {
            skipped.push(email.to_string());
            continue;
        };

        audit(
            ctx,
            NewAuditLog::new(
                &caller.email,
                &caller.name,
                "User Added",
                format!("Added {} as {}", user.email, user.role),
            ),
        )
        .await;
        send_welcome_email(ctx, &user.email);
        users.push(user);
    }

    info!(added = users.len(), skipped = skipped.len(), actor = %caller.email, "users added");
    Ok(AddUsersResponse {
        message: format!("Added {} users", users.len()),
        users,
        skipped,
    })
}

/// Fire and forget; a failed welcome email never fails the request.
fn send_welcome_email(ctx: &ApiContext, email: &str) {
    let mailer = ctx.mailer.clone();
    let message = templates::welcome_email(email, &ctx.dashboard_url);
    tokio::spawn(async move {
        if let Err(error) = mailer.send(&message).await {
            warn!(%error, to = %message.to, "failed to send welcome email");
        }
    });
}

async fn find_target(ctx: &ApiContext, id: &str) -> Result<User, ApiError> {
    ctx.admin
        .find_user(id)
        .await
        .map_err(|e| internal("Failed to load user", e))?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

pub async fn update_user_role(
    ctx: &ApiContext,
    caller: &Caller,
    id: &str,
    req: UpdateRoleRequest,
) -> Result<User, ApiError> {
    require_admin(caller)?;
    let raw = req
        .role
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| ApiError::validation("Missing role"))?;
    let role = parse_role(raw)?;

    let target = find_target(ctx, id).await?;
    ensure_can_manage(caller, &target)?;
    ensure_can_grant(caller, role)?;

    let user = ctx
        .admin
        .update_user_role(id, role)
        .await
        .map_err(|e| internal("Failed to update user role", e))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    audit(
        ctx,
        NewAuditLog::new(
            &caller.email,
            &caller.name,
            "User Role Updated",
            format!("Changed {} from {} to {}", user.email, target.role, user.role),
        ),
    )
    .await;
    Ok(user)
}

pub async fn remove_user(
    ctx: &ApiContext,
    caller: &Caller,
    id: &str,
) -> Result<MessageResponse, ApiError> {
    require_admin(caller)?;
    let target = find_target(ctx, id).await?;
    if target.email.eq_ignore_ascii_case(&caller.email) {
        return Err(ApiError::new(
            ErrorCode::Forbidden,
            "You cannot remove your own account",
        ));
    }
    ensure_can_manage(caller, &target)?;

    let removed = ctx
        .admin
        .remove_user(id)
        .await
        .map_err(|e| internal("Failed to remove user", e))?;
    if !removed {
        return Err(ApiError::not_found("User not found"));
    }
    audit(
        ctx,
        NewAuditLog::new(
            &caller.email,
            &caller.name,
            "User Removed",
            format!("Removed {} ({})", target.email, target.role),
        ),
    )
    .await;
    Ok(MessageResponse {
        message: "User removed".into(),
    })
}

/// Called after sign-in. Non-admins may only refresh their own profile.
pub async fn sync_profile(
    ctx: &ApiContext,
    caller: &Caller,
    req: SyncProfileRequest,
) -> Result<SyncProfileResponse, ApiError> {
    let present = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let (Some(email), Some(name)) = (present(&req.email), present(&req.name)) else {
        return Err(ApiError::validation("Missing email or name"));
    };
    if !caller.role.is_admin() && !email.eq_ignore_ascii_case(&caller.email) {
        return Err(ApiError::new(
            ErrorCode::Forbidden,
            "You can only sync your own profile",
        ));
    }

    let user = ctx
        .admin
        .sync_profile(&email, &name)
        .await
        .map_err(|e| internal("Failed to sync profile", e))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(SyncProfileResponse {
        success: true,
        user,
    })
}

pub async fn send_email(
    ctx: &ApiContext,
    caller: &Caller,
    req: SendEmailRequest,
) -> Result<SendEmailResponse, ApiError> {
    require_admin(caller)?;
    let required = |v: Option<String>| v.filter(|v| !v.trim().is_empty());
    let (Some(to), Some(subject), Some(body)) =
        (required(req.to), required(req.subject), required(req.body))
    else {
        return Err(ApiError::validation(
            "Missing required fields: to, subject, body",
        ));
    };

    let email = OutboundEmail {
        to,
        subject,
        html: templates::custom_body(&body),
    };
    let sent = match ctx.mailer.send(&email).await {
        Ok(Delivery::Sent) => true,
        Ok(Delivery::Skipped) => false,
        Err(MailError::NoRecipients) => {
            warn!(to = %email.to, "send-email request had no valid recipients");
            false
        }
        Err(error) => {
            warn!(%error, to = %email.to, "failed to send email");
            false
        }
    };

    let event = req
        .event_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .map(|id| format!(" for event {id}"))
        .unwrap_or_default();
    let actor_email = req
        .sender_email
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| caller.email.clone());
    audit(
        ctx,
        NewAuditLog::new(
            actor_email,
            &caller.name,
            "Email Sent",
            format!("Reminder email sent to {}{event}: {}", email.to, email.subject),
        )
        .with_status(if sent {
            AuditStatus::Success
        } else {
            AuditStatus::Error
        }),
    )
    .await;

    let message = if sent {
        EMAIL_SENT_MESSAGE
    } else {
        EMAIL_QUEUED_MESSAGE
    };
    Ok(SendEmailResponse {
        success: sent,
        message: message.to_string(),
    })
}

pub async fn list_audit_logs(
    ctx: &ApiContext,
    caller: &Caller,
) -> Result<Vec<AuditLog>, ApiError> {
    require_admin(caller)?;
    ctx.admin
        .list_audit_logs()
        .await
        .map_err(|e| internal("Failed to fetch audit logs", e))
}

/// Replaces the whole control collection. A rejected upload leaves the
/// current collection untouched and is still recorded in the audit log.
pub async fn ingest(
    ctx: &ApiContext,
    caller: &Caller,
    req: IngestRequest,
) -> Result<IngestResponse, ApiError> {
    require_admin(caller)?;
    let controls = match parse_ingest_rows(req) {
        Ok(controls) => controls,
        Err(reason) => return Err(reject_ingest(ctx, caller, reason).await),
    };

    let count = match ctx.controls.replace(controls) {
        Ok(count) => count,
        Err(err) => return Err(reject_ingest(ctx, caller, err.to_string()).await),
    };
    audit(
        ctx,
        NewAuditLog::new(
            &caller.email,
            &caller.name,
            INGEST_ACTION,
            format!("{count} records processed"),
        ),
    )
    .await;
    Ok(IngestResponse {
        message: "Ingestion successful".into(),
        count,
    })
}

fn parse_ingest_rows(req: IngestRequest) -> Result<Vec<Control>, String> {
    let Some(serde_json::Value::Array(rows)) = req.data else {
        return Err("Invalid data array".into());
    };
    if rows.is_empty() {
        return Err("Ingestion payload is empty".into());
    }
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            serde_json::from_value::<Control>(row)
                .map_err(|err| format!("Invalid control at row {index}: {err}"))
        })
        .collect()
}

async fn reject_ingest(ctx: &ApiContext, caller: &Caller, reason: String) -> ApiError {
    warn!(actor = %caller.email, %reason, "ingestion rejected");
    audit(
        ctx,
        NewAuditLog::new(
            &caller.email,
            &caller.name,
            INGEST_ACTION,
            format!("Failed ingestion: {reason}"),
        )
        .with_status(AuditStatus::Error),
    )
    .await;
    ApiError::validation(reason)
}

/// Header row of the bulk-upload CSV.
pub fn template(caller: &Caller) -> Result<String, ApiError> {
    require_admin(caller)?;
    Ok(format!("{}\n", CONTROL_TEMPLATE_COLUMNS.join(",")))
}

/// Audit writes never fail the operation they describe.
async fn audit(ctx: &ApiContext, entry: NewAuditLog) {
    let action = entry.action.clone();
    if let Err(error) = ctx.admin.append_audit_log(entry).await {
        warn!(%error, %action, "failed to append audit log");
    }
}

#[cfg(test)]
#[path = "tests/admin_tests.rs"]
mod tests;
