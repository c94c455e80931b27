mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_json, TestApp};

#[tokio::test]
async fn requests_without_a_valid_token_are_rejected() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let response = app.get("/api/user/files", None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await?;
    assert_eq!(body["error"], "Unauthorized");

    let response = app.get("/api/user/files", Some("not-a-jwt")).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await?;
    assert_eq!(body["error"], "Invalid token");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn first_request_creates_user_with_role_from_domain() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let (_, writer) = app.sign_in("writer@example.com").await?;
    let (_, admin) = app.sign_in("boss@admin.test").await?;

    let response = app.get("/api/admin/users", Some(&writer)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.get("/api/admin/users", Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    let users = body["users"].as_array().expect("users array");
    assert_eq!(users.len(), 2);

    let role_of = |email: &str| {
        users
            .iter()
            .find(|user| user["email"] == email)
            .map(|user| user["role"].clone())
    };
    assert_eq!(role_of("writer@example.com"), Some("user".into()));
    assert_eq!(role_of("boss@admin.test"), Some("admin".into()));
    assert!(users.iter().all(|user| user["emailNotifications"] == true));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn same_email_resolves_to_one_user() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let (first_id, _) = app.sign_in("writer@example.com").await?;
    let (second_id, _) = app.sign_in("writer@example.com").await?;
    assert_eq!(first_id, second_id);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn email_preferences_round_trip() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, token) = app.sign_in("writer@example.com").await?;

    let response = app.get("/api/user/email-preferences", Some(&token)).await?;
    assert_eq!(body_json(response).await?["emailNotifications"], true);

    let response = app
        .patch_json(
            "/api/user/email-preferences",
            &serde_json::json!({ "emailNotifications": "yes" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await?["error"],
        "emailNotifications must be a boolean"
    );

    let response = app
        .patch_json(
            "/api/user/email-preferences",
            &serde_json::json!({ "emailNotifications": false }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["message"], "Email preferences updated successfully");
    assert_eq!(body["emailNotifications"], false);

    let response = app.get("/api/user/email-preferences", Some(&token)).await?;
    assert_eq!(body_json(response).await?["emailNotifications"], false);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn health_is_public() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let response = app.get("/api/health", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?["status"], "ok");

    app.cleanup().await?;
    Ok(())
}
