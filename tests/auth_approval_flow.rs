
use serde_json::json;
use test_support::*;

#[test]
fn registration_waits_for_admin_approval() {
    let workspace = temp_dir("coach-auth-flow");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    open_workspace(&mut stdin, &mut reader, &workspace);
    let admin = bootstrap_admin(&mut stdin, &mut reader);

    let registered = request_ok(
        &mut stdin,
        &mut reader,
        "auth.register",
        json!({
            "email": "new-teacher@example.com",
            "password": PASSWORD,
            "fullName": "New Teacher",
            "role": "teacher",
            "school": "Central High"
        }),
    );
    let user = registered.get("user").expect("user");
    assert_eq!(
        user.get("approvalStatus").and_then(|v| v.as_str()),
        Some("pending")
    );
    assert!(user.get("passwordHash").is_none());
    let user_id = user
        .get("id")
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();

    // Pending accounts cannot log in even with the right password.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "auth.login",
        json!({ "email": "new-teacher@example.com", "password": PASSWORD }),
    );
    assert_eq!(code, "pending_approval");

    let pending = request_ok(
        &mut stdin,
        &mut reader,
        "admin.pendingUsers",
        json!({ "token": admin }),
    );
    assert_eq!(
        pending
            .get("users")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "admin.approveUser",
        json!({ "token": admin, "userId": user_id }),
    );
    let token = login(&mut stdin, &mut reader, "new-teacher@example.com");

    let me = request_ok(&mut stdin, &mut reader, "auth.me", json!({ "token": token }));
    assert_eq!(
        me.get("user")
            .and_then(|u| u.get("email"))
            .and_then(|v| v.as_str()),
        Some("new-teacher@example.com")
    );

    // Approval leaves a notification behind.
    let notifications = request_ok(
        &mut stdin,
        &mut reader,
        "notifications.list",
        json!({ "token": token }),
    );
    let titles: Vec<&str> = notifications
        .get("notifications")
        .and_then(|v| v.as_array())
        .expect("notifications array")
        .iter()
        .filter_map(|n| n.get("title").and_then(|v| v.as_str()))
        .collect();
    assert!(titles.contains(&"Account approved"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn rejected_and_invalid_logins_are_refused() {
    let workspace = temp_dir("coach-auth-reject");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    open_workspace(&mut stdin, &mut reader, &workspace);
    let admin = bootstrap_admin(&mut stdin, &mut reader);

    let registered = request_ok(
        &mut stdin,
        &mut reader,
        "auth.register",
        json!({
            "email": "student@example.com",
            "password": PASSWORD,
            "fullName": "Hopeful Student",
            "role": "student"
        }),
    );
    let user_id = registered
        .get("user")
        .and_then(|u| u.get("id"))
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();

    // Same email twice.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "auth.register",
        json!({
            "email": "student@example.com",
            "password": PASSWORD,
            "fullName": "Duplicate",
            "role": "student"
        }),
    );
    assert_eq!(code, "email_taken");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "admin.rejectUser",
        json!({ "token": admin, "userId": user_id }),
    );
    let code = request_err(
        &mut stdin,
        &mut reader,
        "auth.login",
        json!({ "email": "student@example.com", "password": PASSWORD }),
    );
    assert_eq!(code, "pending_approval");

    // Unknown email and wrong password read the same from outside.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "auth.login",
        json!({ "email": "nobody@example.com", "password": PASSWORD }),
    );
    assert_eq!(code, "invalid_credentials");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "auth.login",
        json!({ "email": "admin@example.com", "password": "wrong-password" }),
    );
    assert_eq!(code, "invalid_credentials");

    // Second admin registration is not auto-approved.
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "auth.register",
        json!({
            "email": "admin2@example.com",
            "password": PASSWORD,
            "fullName": "Second Admin",
            "role": "admin"
        }),
    );
    assert_eq!(
        second
            .get("user")
            .and_then(|u| u.get("approvalStatus"))
            .and_then(|v| v.as_str()),
        Some("pending")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
