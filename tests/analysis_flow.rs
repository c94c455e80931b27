mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use brand_guard::models::PROVIDER_GOOGLE;
use brand_guard::repo;
use common::{acquire_db_lock, body_json, TestApp};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn analysis_is_scored_stored_and_emailed() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, token) = app.sign_in("writer@example.com").await?;
    let file_id = app
        .upload_text("launch.txt", "Get our cheap deal now, folks!", &token)
        .await?;

    let response = app
        .post_json(&format!("/api/user/files/{file_id}/analyze"), &json!({}), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["message"], "Analysis completed successfully");
    assert_eq!(body["summary"]["totalIssues"], 2);
    assert_eq!(body["summary"]["highSeverity"], 1);
    assert_eq!(body["summary"]["mediumSeverity"], 0);
    assert_eq!(body["summary"]["lowSeverity"], 1);
    assert_eq!(body["summary"]["score"], 88);
    assert_eq!(body["emailSent"], true);
    assert_eq!(body["issues"][0]["type"], "banned_word");
    assert_eq!(app.llm().calls(), 1);

    let sent = app.mailer().sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "writer@example.com");
    assert!(sent[0].subject.contains("launch.txt"));
    assert!(sent[0].html.contains("Default Guidelines"));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn repeat_analysis_returns_stored_result() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, token) = app.sign_in("writer@example.com").await?;
    let file_id = app.upload_text("copy.txt", "Cheap and cheerful", &token).await?;
    let path = format!("/api/user/files/{file_id}/analyze");

    let first = body_json(app.post_json(&path, &json!({}), Some(&token)).await?).await?;
    let response = app.post_json(&path, &json!({}), Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let second = body_json(response).await?;

    assert_eq!(second["message"], "Analysis completed successfully (cached)");
    assert_eq!(second["analysisId"], first["analysisId"]);
    assert_eq!(second["summary"], first["summary"]);
    assert!(second.get("emailSent").is_none());
    assert_eq!(app.llm().calls(), 1);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn notifications_can_be_turned_off() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, token) = app.sign_in("writer@example.com").await?;
    app.patch_json(
        "/api/user/email-preferences",
        &json!({ "emailNotifications": false }),
        Some(&token),
    )
    .await?;
    let file_id = app.upload_text("copy.txt", "Cheap and cheerful", &token).await?;

    let response = app
        .post_json(&format!("/api/user/files/{file_id}/analyze"), &json!({}), Some(&token))
        .await?;
    let body = body_json(response).await?;
    assert_eq!(body["emailSent"], false);
    assert!(app.mailer().sent().is_empty());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn analysis_requires_access_and_content() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, owner) = app.sign_in("owner@example.com").await?;
    let (_, other) = app.sign_in("other@example.com").await?;
    let file_id = app.upload_text("copy.txt", "Hello", &owner).await?;

    let response = app
        .post_json(&format!("/api/user/files/{file_id}/analyze"), &json!({}), Some(&other))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post_json(
            &format!("/api/user/files/{}/analyze", Uuid::new_v4()),
            &json!({}),
            Some(&owner),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let empty_id = app.upload_text("blank.txt", "   ", &owner).await?;
    let response = app
        .post_json(&format!("/api/user/files/{empty_id}/analyze"), &json!({}), Some(&owner))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.llm().calls(), 0);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn issue_status_workflow() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, token) = app.sign_in("writer@example.com").await?;
    let file_id = app.upload_text("copy.txt", "Cheap and cheerful", &token).await?;
    let analysis = body_json(
        app.post_json(&format!("/api/user/files/{file_id}/analyze"), &json!({}), Some(&token))
            .await?,
    )
    .await?;
    let analysis_id = analysis["analysisId"].as_str().expect("analysis id").to_string();
    let issues_path = format!("/api/user/analysis/{analysis_id}/issues");

    let response = app.get(&issues_path, Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    let issues = body["issues"].as_array().expect("issues array");
    assert_eq!(issues.len(), 2);
    assert!(issues.iter().all(|issue| issue["status"] == "open"));
    let issue_id = issues[0]["id"].as_str().expect("issue id").to_string();

    let response = app
        .patch_json(
            &issues_path,
            &json!({ "issueId": &issue_id, "status": "archived" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await?["error"], "Invalid issueId or status");

    let response = app
        .patch_json(
            &issues_path,
            &json!({ "issueId": Uuid::new_v4(), "status": "fixed" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .patch_json(
            &issues_path,
            &json!({ "issueId": &issue_id, "status": "fixed" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["status"], "fixed");

    let response = app.get("/api/user/analysis?stats=true", Some(&token)).await?;
    let body = body_json(response).await?;
    assert_eq!(body["analyses"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["stats"]["totalAnalyses"], 1);
    assert_eq!(body["stats"]["avgComplianceScore"], 88);
    assert_eq!(body["stats"]["totalIssues"], 2);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn issue_updates_reject_malformed_bodies_and_ids() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, token) = app.sign_in("writer@example.com").await?;
    let file_id = app.upload_text("copy.txt", "Cheap and cheerful", &token).await?;
    let analysis = body_json(
        app.post_json(&format!("/api/user/files/{file_id}/analyze"), &json!({}), Some(&token))
            .await?,
    )
    .await?;
    let analysis_id = analysis["analysisId"].as_str().expect("analysis id").to_string();
    let issues_path = format!("/api/user/analysis/{analysis_id}/issues");

    let response = app
        .patch_json(
            &issues_path,
            &json!({ "issueId": Uuid::new_v4(), "status": 5 }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await?["error"], "Invalid issueId or status");

    let response = app
        .send_raw(Method::PATCH, &issues_path, &token, "application/json", "status=fixed")
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await?["error"], "Invalid issueId or status");

    let response = app
        .get("/api/user/analysis/not-a-uuid/issues", Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await?["error"], "Analysis not found");

    let response = app
        .patch_json(
            "/api/user/analysis/not-a-uuid/issues",
            &json!({ "issueId": Uuid::new_v4(), "status": "fixed" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await?["error"], "Analysis not found");

    let response = app.get("/api/user/files/not-a-uuid", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await?["error"], "File not found");

    let response = app
        .post_json("/api/user/files/not-a-uuid/analyze", &json!({}), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await?["error"], "File not found");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn brand_file_analysis_is_reused() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (user_id, token) = app.sign_in("writer@example.com").await?;
    app.with_conn(move |conn| {
        repo::drive::upsert_tokens(conn, user_id, PROVIDER_GOOGLE, "access-1", None, None)?;
        Ok(())
    })
    .await?;
    app.drive()
        .add_file("g1", "voice.txt", "text/plain", "Never call the product cheap.");

    let first_file = app.upload_text("a.txt", "Get our cheap deal now", &token).await?;
    let second_file = app.upload_text("b.txt", "Get our cheap deal now", &token).await?;
    let body = json!({ "brandFileId": "g1" });

    let first_path = format!("/api/user/files/{first_file}/analyze");
    let response = app.post_json(&first_path, &body, Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let first = body_json(response).await?;
    assert_eq!(first["message"], "Analysis completed successfully");
    assert_eq!(first["rulesApplied"], 1);
    assert_eq!(app.llm().calls(), 1);
    let prompt = app.llm().last_prompt().unwrap_or_default();
    assert!(prompt.contains("Brand Guidelines from \"voice.txt\""));
    assert!(prompt.contains("Never call the product cheap."));

    let response = app.post_json(&first_path, &body, Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let repeat = body_json(response).await?;
    assert_eq!(repeat["message"], "Analysis completed successfully (cached)");
    assert_eq!(repeat["analysisId"], first["analysisId"]);
    assert_eq!(app.llm().calls(), 1);

    let response = app
        .post_json(&format!("/api/user/files/{second_file}/analyze"), &body, Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let second = body_json(response).await?;
    assert_eq!(second["message"], "Analysis completed successfully");
    assert_ne!(second["analysisId"], first["analysisId"]);
    assert_eq!(second["summary"], first["summary"]);
    assert_eq!(app.llm().calls(), 1);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn unavailable_brand_file_falls_back_to_rules() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, token) = app.sign_in("writer@example.com").await?;
    let file_id = app.upload_text("copy.txt", "Really cheap deals", &token).await?;

    let response = app
        .post_json(
            &format!("/api/user/files/{file_id}/analyze"),
            &json!({ "brandFileId": "missing" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["message"], "Analysis completed successfully");
    assert_eq!(app.llm().calls(), 1);

    let prompt = app.llm().last_prompt().unwrap_or_default();
    assert!(prompt.contains("**BRAND GUIDELINES TO ENFORCE:**"));
    assert!(prompt.contains("\"bannedWords\""));
    assert!(prompt.contains("literally"));

    app.cleanup().await?;
    Ok(())
}
