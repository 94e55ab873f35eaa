//! Integration tests for volume, snapshot and boot endpoints

use anyhow::Result;
use atmosphere::repositories::SnapshotRepository;
use axum::http::StatusCode;
use serde_json::json;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{ACCOUNT_KEY, TestApp};

async fn create_volume(app: &TestApp, name: &str, size: i64) -> String {
    let (status, body) = app
        .request(
            "POST",
            &app.identity_path("/volumes"),
            Some(json!({"name": name, "size": size})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["alias"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn create_volume_accepts_size_as_string() -> Result<()> {
    let app = TestApp::spawn().await?;

    let (status, body) = app
        .request(
            "POST",
            &app.identity_path("/volumes"),
            Some(json!({"name": "scratch", "size": "10", "description": "work area"})),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["size"], 10);
    assert_eq!(body["name"], "scratch");
    assert_eq!(body["status"], "available");
    assert_eq!(body["created_by"], "alice");
    assert_eq!(body["provider"], "openstack");
    assert!(body["end_date"].is_null());

    let (status, list) = app.request("GET", &app.identity_path("/volumes"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn create_volume_reports_missing_fields() -> Result<()> {
    let app = TestApp::spawn().await?;

    let (status, body) = app
        .request(
            "POST",
            &app.identity_path("/volumes"),
            Some(json!({"description": "no name"})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Missing required POST data variables: [name, size]"
    );
    assert_eq!(body["details"]["missing"], json!(["name", "size"]));
    Ok(())
}

#[tokio::test]
async fn create_volume_rejects_non_positive_size() -> Result<()> {
    let app = TestApp::spawn().await?;

    let (status, body) = app
        .request(
            "POST",
            &app.identity_path("/volumes"),
            Some(json!({"name": "v", "size": "0"})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
    Ok(())
}

#[tokio::test]
async fn image_volumes_are_limited_to_headroom_above_image_size() -> Result<()> {
    let app = TestApp::spawn().await?;
    let path = app.identity_path("/volumes");

    // img-ubuntu-22 is 10 GB; four more are allowed
    let (status, body) = app
        .request(
            "POST",
            &path,
            Some(json!({"name": "too-big", "size": 15, "image_id": "img-ubuntu-22"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("4GB larger"), "{message}");
    assert!(message.contains("10 GB"), "{message}");

    let (status, _) = app
        .request(
            "POST",
            &path,
            Some(json!({"name": "fits", "size": 14, "image": "img-ubuntu-22"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn create_volume_from_unknown_image_is_not_found() -> Result<()> {
    let app = TestApp::spawn().await?;

    let (status, body) = app
        .request(
            "POST",
            &app.identity_path("/volumes"),
            Some(json!({"name": "v", "size": 5, "image_id": "img-missing"})),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Image img-missing does not exist");
    Ok(())
}

#[tokio::test]
async fn provider_quota_maps_to_payload_too_large() -> Result<()> {
    let app = TestApp::spawn().await?;

    let (status, body) = app
        .request(
            "POST",
            &app.identity_path("/volumes"),
            Some(json!({"name": "huge", "size": 5000})),
        )
        .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "QUOTA_EXCEEDED");
    Ok(())
}

#[tokio::test]
async fn rejected_credentials_return_unauthorized() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.cloud.reject_key(ACCOUNT_KEY).await;

    let (status, body) = app.request("GET", &app.identity_path("/volumes"), None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Identity/Provider Authentication Failed");
    Ok(())
}

#[tokio::test]
async fn unknown_identity_is_not_found() -> Result<()> {
    let app = TestApp::spawn().await?;
    let missing = uuid::Uuid::new_v4();

    let (status, body) = app
        .request("GET", &format!("/api/v1/identities/{}/volumes", missing), None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], format!("Identity {} does not exist", missing));
    Ok(())
}

#[tokio::test]
async fn destroy_unknown_volume_is_not_found() -> Result<()> {
    let app = TestApp::spawn().await?;

    let (status, body) = app
        .request("DELETE", &app.identity_path("/volumes/vol-missing"), None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Volume vol-missing does not exist");
    Ok(())
}

#[tokio::test]
async fn destroy_end_dates_once() -> Result<()> {
    let app = TestApp::spawn().await?;
    let alias = create_volume(&app, "short-lived", 5).await;
    let path = app.identity_path(&format!("/volumes/{}", alias));

    let (status, first) = app.request("DELETE", &path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(first["end_date"].is_string());

    // Gone from the provider; the mirror keeps its first end date
    let (status, second) = app.request("DELETE", &path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["end_date"], first["end_date"]);
    Ok(())
}

#[tokio::test]
async fn destroy_end_dates_mirror_when_provider_fails() -> Result<()> {
    let app = TestApp::spawn().await?;
    let alias = create_volume(&app, "stubborn", 5).await;
    app.cloud.set_fail_destroy(true).await;

    let (status, body) = app
        .request("DELETE", &app.identity_path(&format!("/volumes/{}", alias)), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["end_date"].is_string());
    Ok(())
}

#[tokio::test]
async fn patch_and_put_update_volume_metadata() -> Result<()> {
    let app = TestApp::spawn().await?;
    let alias = create_volume(&app, "before", 5).await;
    let path = app.identity_path(&format!("/volumes/{}", alias));

    let (status, body) = app
        .request("PATCH", &path, Some(json!({"description": "kept"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "before");
    assert_eq!(body["description"], "kept");

    let (status, body) = app.request("PUT", &path, Some(json!({"name": "after"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "after");
    assert!(body["description"].is_null());

    let (status, _) = app
        .request("PUT", &path, Some(json!({"description": "no name"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.request("PATCH", &path, Some(json!({"name": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn snapshot_then_volume_creates_both() -> Result<()> {
    let app = TestApp::spawn().await?;
    let source = create_volume(&app, "source", 5).await;

    let (status, body) = app
        .request(
            "POST",
            &app.identity_path("/volumes/snapshot"),
            Some(json!({"display_name": "copy", "volume_id": source, "size": "5"})),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["name"], "copy");
    assert_ne!(body["alias"], source.as_str());
    assert_eq!(app.cloud.snapshot_ids(ACCOUNT_KEY).await.len(), 1);

    let (status, snapshots) = app
        .request("GET", &app.identity_path("/volumes/snapshot"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshots[0]["volume"], source.as_str());
    Ok(())
}

#[tokio::test]
async fn snapshot_requires_available_volume() -> Result<()> {
    let app = TestApp::spawn().await?;
    let source = create_volume(&app, "attached", 5).await;

    // Booting from the volume marks it in-use
    let (status, _) = app
        .request(
            "POST",
            &app.identity_path(&format!("/volumes/{}/boot", source)),
            Some(json!({"name": "vm", "size": "m1.small"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .request(
            "POST",
            &app.identity_path("/volumes/snapshot"),
            Some(json!({"display_name": "copy", "volume_id": source, "size": 5})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Volume status must be 'available'. Did you detach the volume?"
    );
    assert!(app.cloud.snapshot_ids(ACCOUNT_KEY).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn snapshot_from_unknown_snapshot_id_aborts() -> Result<()> {
    let app = TestApp::spawn().await?;
    let source = create_volume(&app, "source", 5).await;

    let (status, body) = app
        .request(
            "POST",
            &app.identity_path("/volumes/snapshot"),
            Some(json!({
                "display_name": "copy",
                "volume_id": source,
                "size": 5,
                "snapshot_id": "snap-missing"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Snapshot snap-missing not found. Process aborted.");
    Ok(())
}

#[tokio::test]
async fn failed_volume_creation_deletes_new_snapshot() -> Result<()> {
    let app = TestApp::spawn().await?;
    let source = create_volume(&app, "source", 5).await;
    app.cloud.set_fail_volume_create(true).await;

    let (status, body) = app
        .request(
            "POST",
            &app.identity_path("/volumes/snapshot"),
            Some(json!({"display_name": "copy", "volume_id": source, "size": 5})),
        )
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Volume creation failed. Contact support");
    assert!(app.cloud.snapshot_ids(ACCOUNT_KEY).await.is_empty());

    let cleanups = SnapshotRepository::new(&app.db)
        .unresolved_cleanups(app.identity_id)
        .await?;
    assert!(cleanups.is_empty());
    Ok(())
}

#[tokio::test]
async fn undeletable_snapshot_is_recorded_for_cleanup() -> Result<()> {
    let app = TestApp::spawn().await?;
    let source = create_volume(&app, "source", 5).await;
    app.cloud.set_fail_volume_create(true).await;
    app.cloud.set_fail_snapshot_delete(true).await;

    let (status, _) = app
        .request(
            "POST",
            &app.identity_path("/volumes/snapshot"),
            Some(json!({"display_name": "copy", "volume_id": source, "size": 5})),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let leftover = app.cloud.snapshot_ids(ACCOUNT_KEY).await;
    assert_eq!(leftover.len(), 1);

    let cleanups = SnapshotRepository::new(&app.db)
        .unresolved_cleanups(app.identity_id)
        .await?;
    assert_eq!(cleanups.len(), 1);
    assert_eq!(cleanups[0].snapshot_alias, leftover[0]);
    Ok(())
}

#[tokio::test]
async fn delete_snapshot_removes_it_from_provider() -> Result<()> {
    let app = TestApp::spawn().await?;
    let source = create_volume(&app, "source", 5).await;
    let (status, _) = app
        .request(
            "POST",
            &app.identity_path("/volumes/snapshot"),
            Some(json!({"display_name": "copy", "volume_id": source, "size": 5})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let snapshot_id = app.cloud.snapshot_ids(ACCOUNT_KEY).await.remove(0);
    let path = app.identity_path(&format!("/volumes/snapshot/{}", snapshot_id));

    let (status, body) = app.request("GET", &path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alias"], snapshot_id.as_str());

    let (status, _) = app.request("DELETE", &path, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.request("GET", &path, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["message"],
        format!("Snapshot {} does not exist", snapshot_id)
    );
    Ok(())
}

#[tokio::test]
async fn boot_prefers_image_over_path_volume() -> Result<()> {
    let app = TestApp::spawn().await?;
    let volume = create_volume(&app, "root-disk", 5).await;

    let (status, body) = app
        .request(
            "POST",
            &app.identity_path(&format!("/volumes/{}/boot", volume)),
            Some(json!({
                "name": "vm",
                "size": "m1.small",
                "image_id": "img-centos-7",
                "key_name": "lab"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["source_type"], "image");
    assert_eq!(body["source"], "img-centos-7");
    assert_eq!(body["size"], "m1.small");

    let alias = body["alias"].as_str().unwrap();
    let remote = app.cloud.instance(ACCOUNT_KEY, alias).await.unwrap();
    assert_eq!(remote.extra["key_name"], "lab");
    Ok(())
}

#[tokio::test]
async fn boot_uses_path_volume_without_body_source() -> Result<()> {
    let app = TestApp::spawn().await?;
    let volume = create_volume(&app, "root-disk", 5).await;

    let (status, body) = app
        .request(
            "POST",
            &app.identity_path(&format!("/volumes/{}/boot", volume)),
            Some(json!({"name": "vm", "size": "m1.medium"})),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["source_type"], "volume");
    assert_eq!(body["source"], volume.as_str());
    Ok(())
}

#[tokio::test]
async fn boot_without_source_is_rejected() -> Result<()> {
    let app = TestApp::spawn().await?;

    let (status, body) = app
        .request(
            "POST",
            &app.identity_path("/volumes/boot"),
            Some(json!({"name": "vm", "size": "m1.small"})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_SOURCE");
    Ok(())
}

#[tokio::test]
async fn boot_with_unknown_size_is_not_found() -> Result<()> {
    let app = TestApp::spawn().await?;

    let (status, body) = app
        .request(
            "POST",
            &app.identity_path("/volumes/boot"),
            Some(json!({"name": "vm", "size": "m1.huge", "image_id": "img-ubuntu-22"})),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Size m1.huge does not exist");
    Ok(())
}

#[tokio::test]
async fn listing_mirrors_volumes_created_outside_the_api() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.cloud
        .seed_volume(
            ACCOUNT_KEY,
            atmosphere::cloud::RemoteVolume {
                id: "vol-external".to_string(),
                name: "console-made".to_string(),
                size: 3,
                status: "available".to_string(),
                description: None,
                snapshot_id: None,
                image_id: None,
                metadata: Some(json!({"origin": "console"})),
                created_at: chrono::Utc::now(),
            },
        )
        .await;

    let (status, list) = app.request("GET", &app.identity_path("/volumes"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list[0]["alias"], "vol-external");
    assert_eq!(list[0]["metadata"]["origin"], "console");

    let (status, body) = app
        .request("GET", &app.identity_path("/volumes/vol-external"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["size"], 3);
    Ok(())
}

#[tokio::test]
async fn provider_rate_limiting_returns_retry_after() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.cloud.set_rate_limited(true).await;

    let (status, body) = app.request("GET", &app.identity_path("/volumes"), None).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RATE_LIMITED");
    assert_eq!(body["retry_after"], 60);
    Ok(())
}

#[tokio::test]
async fn oversized_volume_is_rejected_without_overflow() -> Result<()> {
    let app = TestApp::spawn().await?;
    create_volume(&app, "small", 10).await;

    let (status, body) = app
        .request(
            "POST",
            &app.identity_path("/volumes"),
            Some(json!({"name": "huge", "size": "9223372036854775807"})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(body["details"]["size"].is_array());
    let (_, list) = app.request("GET", &app.identity_path("/volumes"), None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn end_dated_volume_keeps_deleted_status_in_listing() -> Result<()> {
    let app = TestApp::spawn().await?;
    let alias = create_volume(&app, "stubborn", 5).await;
    app.cloud.set_fail_destroy(true).await;

    let (status, _) = app
        .request("DELETE", &app.identity_path(&format!("/volumes/{}", alias)), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, list) = app.request("GET", &app.identity_path("/volumes"), None).await;
    assert_eq!(status, StatusCode::OK);
    let row = list
        .as_array()
        .unwrap()
        .iter()
        .find(|volume| volume["alias"] == alias.as_str())
        .unwrap();
    assert!(row["end_date"].is_string());
    assert_eq!(row["status"], "deleted");
    Ok(())
}

#[tokio::test]
async fn boot_prefers_snapshot_over_body_volume() -> Result<()> {
    let app = TestApp::spawn().await?;
    let source = create_volume(&app, "source", 5).await;
    let (status, _) = app
        .request(
            "POST",
            &app.identity_path("/volumes/snapshot"),
            Some(json!({"display_name": "copy", "volume_id": source, "size": 5})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let snapshot_id = app.cloud.snapshot_ids(ACCOUNT_KEY).await.remove(0);

    let (status, body) = app
        .request(
            "POST",
            &app.identity_path("/volumes/boot"),
            Some(json!({
                "name": "vm",
                "size": "m1.small",
                "snapshot_id": snapshot_id,
                "volume_id": source
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["source_type"], "snapshot");
    assert_eq!(body["source"], snapshot_id.as_str());
    Ok(())
}
