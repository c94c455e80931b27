mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_json, TestApp};
use uuid::Uuid;

#[tokio::test]
async fn text_upload_is_stored_and_parsed() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (user_id, token) = app.sign_in("writer@example.com").await?;

    let response = app
        .upload(&[("hello.txt", "text/plain", "Hello world".as_bytes())], &token)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["message"], "Files processed");
    assert_eq!(body["totalFiles"], 1);
    assert_eq!(body["successCount"], 1);
    assert_eq!(body["failedCount"], 0);

    let result = &body["results"][0];
    assert_eq!(result["status"], "completed");
    assert_eq!(result["parsing"]["success"], true);
    assert_eq!(result["parsing"]["wordCount"], 2);
    assert_eq!(result["parsing"]["textLength"], 11);

    let file_id = result["fileId"].as_str().expect("file id");
    let key = format!("uploads/{user_id}/{file_id}/hello.txt");
    let stored = app.storage().get(&key).await.expect("object stored");
    assert_eq!(stored.bytes, b"Hello world");
    assert_eq!(stored.content_type, "text/plain");

    let response = app
        .get(&format!("/api/user/files/{file_id}"), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let detail = body_json(response).await?;
    assert_eq!(detail["file"]["filename"], "hello.txt");
    assert_eq!(detail["file"]["status"], "completed");
    assert_eq!(detail["results"]["extractedText"], "Hello world");
    assert_eq!(detail["results"]["wordCount"], 2);
    assert_eq!(detail["results"]["characterCount"], 11);

    let response = app.get("/api/user/files", Some(&token)).await?;
    let list = body_json(response).await?;
    assert_eq!(list["files"].as_array().map(Vec::len), Some(1));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn one_bad_file_does_not_abort_the_batch() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, token) = app.sign_in("writer@example.com").await?;

    let response = app
        .upload(
            &[
                ("notes.txt", "text/plain", "Brand voice notes".as_bytes()),
                ("old.doc", "application/msword", &[0xd0, 0xcf, 0x11, 0xe0][..]),
                ("blob.bin", "application/octet-stream", &[0x00, 0x01][..]),
            ],
            &token,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["totalFiles"], 3);
    assert_eq!(body["successCount"], 1);
    assert_eq!(body["failedCount"], 2);

    let legacy = &body["results"][1];
    assert_eq!(legacy["status"], "failed");
    assert!(legacy["error"]
        .as_str()
        .unwrap_or_default()
        .contains("convert to .docx"));

    let legacy_id = legacy["fileId"].as_str().expect("failed file keeps its id");
    let response = app
        .get(&format!("/api/user/files/{legacy_id}"), Some(&token))
        .await?;
    let detail = body_json(response).await?;
    assert_eq!(detail["file"]["status"], "failed");
    assert!(detail["results"].is_null());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn upload_without_files_is_rejected() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, token) = app.sign_in("writer@example.com").await?;

    let response = app
        .upload_field("attachment", &[("a.txt", "text/plain", "hi".as_bytes())], &token)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await?["error"], "No files provided");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn files_are_private_to_owner_and_admins() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, owner) = app.sign_in("owner@example.com").await?;
    let (_, other) = app.sign_in("other@example.com").await?;
    let (_, admin) = app.sign_in("boss@admin.test").await?;

    let file_id = app.upload_text("copy.txt", "Our new product", &owner).await?;
    let path = format!("/api/user/files/{file_id}");

    let response = app.get(&path, Some(&other)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await?["error"], "Access denied");

    let response = app.get(&path, Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .get(&format!("/api/user/files/{}", Uuid::new_v4()), Some(&owner))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await?["error"], "File not found");

    app.cleanup().await?;
    Ok(())
}
