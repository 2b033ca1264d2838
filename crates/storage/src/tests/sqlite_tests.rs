use super::*;

#[tokio::test]
async fn memory_database_is_seeded_once() {
    let store = SqliteAdminStore::connect("sqlite::memory:").await.expect("db");
    store.health_check().await.expect("health");
    let users = store.list_users().await.expect("users");
    assert_eq!(users.len(), 4);
    assert_eq!(users[0].role, Role::SuperAdmin);

    store.seed_if_empty().await.expect("reseed");
    assert_eq!(store.list_users().await.expect("users").len(), 4);
}

#[tokio::test]
async fn user_lifecycle_round_trips_through_sqlite() {
    let store = SqliteAdminStore::connect("sqlite::memory:").await.expect("db");
    let user = store
        .add_user("new.person@example.com", Role::Viewer)
        .await
        .expect("add")
        .expect("user");
    assert!(store
        .add_user("NEW.PERSON@example.com", Role::Viewer)
        .await
        .expect("add")
        .is_none());

    let updated = store
        .update_user_role(&user.id, Role::Admin)
        .await
        .expect("update")
        .expect("user");
    assert_eq!(updated.role, Role::Admin);
    assert_eq!(updated.designation, crate::PENDING_DESIGNATION);

    let synced = store
        .sync_profile("new.person@example.com", "New Person")
        .await
        .expect("sync")
        .expect("user");
    assert_eq!(synced.name, "New Person");

    assert!(store.remove_user(&user.id).await.expect("remove"));
    assert!(store.find_user(&user.id).await.expect("find").is_none());
}

#[tokio::test]
async fn concurrent_adds_of_one_email_insert_a_single_user() {
    let store = SqliteAdminStore::connect("sqlite::memory:").await.expect("db");
    let (first, second) = tokio::join!(
        store.add_user("race@example.com", Role::Viewer),
        store.add_user("RACE@example.com", Role::Admin),
    );
    let added: Vec<User> = [first.expect("first"), second.expect("second")]
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(added.len(), 1);

    let matching = store
        .list_users()
        .await
        .expect("users")
        .into_iter()
        .filter(|u| u.email.eq_ignore_ascii_case("race@example.com"))
        .count();
    assert_eq!(matching, 1);
}

#[tokio::test]
async fn audit_log_order_is_newest_first() {
    let store = SqliteAdminStore::connect("sqlite::memory:").await.expect("db");
    let appended = store
        .append_audit_log(
            NewAuditLog::new("admin@example.com", "System Admin", "Email Sent", "to x")
                .with_status(AuditStatus::Error),
        )
        .await
        .expect("append");
    let logs = store.list_audit_logs().await.expect("logs");
    assert_eq!(logs.len(), 3);
    assert_eq!(logs[0].id, appended.id);
    assert_eq!(logs[0].status, AuditStatus::Error);
    assert_eq!(logs[2].action, "User Access Update");
}

#[tokio::test]
async fn file_database_creates_parent_directory() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("controls_admin_test_{suffix}"));
    let db_path = temp_root.join("nested").join("admin.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let store = SqliteAdminStore::connect(&database_url).await.expect("db");
    drop(store);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}
