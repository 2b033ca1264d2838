use super::*;

#[tokio::test]
async fn seeded_store_lists_default_users() {
    let store = InMemoryAdminStore::seeded();
    let users = store.list_users().await.expect("users");
    assert_eq!(users.len(), 4);
    assert_eq!(users[0].id, ROOT_USER_ID);
    assert_eq!(users[0].role, Role::SuperAdmin);
}

#[tokio::test]
async fn added_user_gets_pending_profile_and_duplicates_are_skipped() {
    let store = InMemoryAdminStore::seeded();
    let user = store
        .add_user("jane.roe@example.com", Role::Viewer)
        .await
        .expect("add")
        .expect("new user");
    assert_eq!(user.name, "jane roe");
    assert_eq!(user.designation, PENDING_DESIGNATION);

    let duplicate = store
        .add_user("Jane.Roe@Example.com", Role::Admin)
        .await
        .expect("add");
    assert!(duplicate.is_none());
    assert_eq!(store.list_users().await.expect("users").len(), 5);
}

#[tokio::test]
async fn role_update_and_removal_report_missing_users() {
    let store = InMemoryAdminStore::seeded();
    let updated = store
        .update_user_role("3", Role::Admin)
        .await
        .expect("update")
        .expect("user");
    assert_eq!(updated.role, Role::Admin);
    assert!(store
        .update_user_role("missing", Role::Admin)
        .await
        .expect("update")
        .is_none());

    assert!(store.remove_user("4").await.expect("remove"));
    assert!(!store.remove_user("4").await.expect("remove"));
    assert!(store.find_user("4").await.expect("find").is_none());
}

#[tokio::test]
async fn sync_profile_updates_name_by_email() {
    let store = InMemoryAdminStore::seeded();
    let user = store
        .sync_profile("ALICE.SMITH@example.com", "Alice M. Smith")
        .await
        .expect("sync")
        .expect("user");
    assert_eq!(user.name, "Alice M. Smith");
    assert!(store
        .sync_profile("nobody@example.com", "Nobody")
        .await
        .expect("sync")
        .is_none());
}

#[tokio::test]
async fn audit_logs_are_listed_newest_first() {
    let store = InMemoryAdminStore::seeded();
    let appended = store
        .append_audit_log(
            NewAuditLog::new("admin@example.com", "System Admin", "User Added", "Added user x")
                .with_status(AuditStatus::Reference),
        )
        .await
        .expect("append");
    assert!(appended.id.starts_with("log-"));

    let logs = store.list_audit_logs().await.expect("logs");
    assert_eq!(logs.len(), 3);
    assert_eq!(logs[0].id, appended.id);
    assert_eq!(logs[0].status, AuditStatus::Reference);
    assert!(logs[1].timestamp > logs[2].timestamp);
}

#[test]
fn display_name_replaces_first_dot_only() {
    assert_eq!(display_name_from_email("a.b.c@example.com"), "a b.c");
    assert_eq!(display_name_from_email("solo"), "solo");
}
