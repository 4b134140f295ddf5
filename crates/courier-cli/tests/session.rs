//! Integration tests for login, status, token and logout commands.

use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::tempdir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn read_session(home: &Path) -> Value {
    let raw = fs::read_to_string(home.join("auth_prefs.json")).unwrap();
    serde_json::from_str(&raw).unwrap()
}

fn write_session(home: &Path, session: &Value) {
    fs::write(home.join("auth_prefs.json"), session.to_string()).unwrap();
}

#[tokio::test]
async fn test_login_stores_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"email": "ana@example.com", "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userId": 42,
            "accessToken": "access-token-0123456789",
            "refreshToken": "refresh-token-0123456789"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let home = tempdir().unwrap();

    cargo_bin_cmd!("courier")
        .env("COURIER_HOME", home.path())
        .env("COURIER_BASE_URL", server.uri())
        .env("COURIER_BLOCK_REAL_API", "1")
        .env("COURIER_PASSWORD", "hunter2")
        .args(["login", "--email", "ana@example.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged in as user 42"));

    let session = read_session(home.path());
    assert_eq!(session["is_logged_in"], json!(true));
    assert_eq!(session["user_id"], json!(42));
    assert_eq!(session["access_token"], json!("access-token-0123456789"));
    assert_eq!(session["refresh_token"], json!("refresh-token-0123456789"));
}

#[tokio::test]
async fn test_rejected_login_leaves_no_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})),
        )
        .mount(&server)
        .await;

    let home = tempdir().unwrap();

    cargo_bin_cmd!("courier")
        .env("COURIER_HOME", home.path())
        .env("COURIER_BASE_URL", server.uri())
        .env("COURIER_BLOCK_REAL_API", "1")
        .args(["login", "--email", "ana@example.com", "--password", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Bad credentials"));

    assert!(!home.path().join("auth_prefs.json").exists());
}

#[test]
fn test_status_redacts_tokens() {
    let home = tempdir().unwrap();
    write_session(
        home.path(),
        &json!({
            "is_logged_in": true,
            "user_id": 7,
            "access_token": "abcdefghijklmnopqrstuvwxyz",
            "refresh_token": "short"
        }),
    );

    cargo_bin_cmd!("courier")
        .env("COURIER_HOME", home.path())
        .env("COURIER_BASE_URL", "http://127.0.0.1:9")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("User:          7"))
        .stdout(predicate::str::contains("abcdefghijkl..."))
        .stdout(predicate::str::contains("***"))
        .stdout(predicate::str::contains("abcdefghijklmnopqrstuvwxyz").not());
}

#[test]
fn test_status_when_logged_out() {
    let home = tempdir().unwrap();

    cargo_bin_cmd!("courier")
        .env("COURIER_HOME", home.path())
        .env("COURIER_BASE_URL", "http://127.0.0.1:9")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not logged in"));
}

#[test]
fn test_logout_clears_session() {
    let home = tempdir().unwrap();
    write_session(
        home.path(),
        &json!({
            "is_logged_in": true,
            "user_id": 7,
            "access_token": "access",
            "refresh_token": "refresh"
        }),
    );

    cargo_bin_cmd!("courier")
        .env("COURIER_HOME", home.path())
        .env("COURIER_BASE_URL", "http://127.0.0.1:9")
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged out"));

    let session = read_session(home.path());
    assert_eq!(session["is_logged_in"], json!(false));
    assert!(session.get("user_id").is_none());
    assert!(session.get("access_token").is_none());
    assert!(session.get("refresh_token").is_none());
}

#[test]
fn test_set_access_token_keeps_other_fields() {
    let home = tempdir().unwrap();
    write_session(
        home.path(),
        &json!({
            "is_logged_in": true,
            "user_id": 7,
            "access_token": "old-access",
            "refresh_token": "refresh"
        }),
    );

    cargo_bin_cmd!("courier")
        .env("COURIER_HOME", home.path())
        .env("COURIER_BASE_URL", "http://127.0.0.1:9")
        .args(["token", "set-access", "new-access"])
        .assert()
        .success();

    let session = read_session(home.path());
    assert_eq!(session["access_token"], json!("new-access"));
    assert_eq!(session["refresh_token"], json!("refresh"));
    assert_eq!(session["user_id"], json!(7));
}

#[tokio::test]
async fn test_token_refresh_rotates_both_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_json(json!({"refreshToken": "refresh-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "access-2",
            "refreshToken": "refresh-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let home = tempdir().unwrap();
    write_session(
        home.path(),
        &json!({
            "is_logged_in": true,
            "user_id": 7,
            "access_token": "access-1",
            "refresh_token": "refresh-1"
        }),
    );

    cargo_bin_cmd!("courier")
        .env("COURIER_HOME", home.path())
        .env("COURIER_BASE_URL", server.uri())
        .env("COURIER_BLOCK_REAL_API", "1")
        .args(["token", "refresh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tokens refreshed"));

    let session = read_session(home.path());
    assert_eq!(session["access_token"], json!("access-2"));
    assert_eq!(session["refresh_token"], json!("refresh-2"));
}

#[test]
fn test_token_refresh_without_refresh_token_fails() {
    let home = tempdir().unwrap();

    cargo_bin_cmd!("courier")
        .env("COURIER_HOME", home.path())
        .env("COURIER_BASE_URL", "http://127.0.0.1:9")
        .args(["token", "refresh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No refresh token stored"));
}

#[tokio::test]
async fn test_requests_use_stored_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/deliveries"))
        .and(header("authorization", "Bearer stored-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let home = tempdir().unwrap();
    write_session(
        home.path(),
        &json!({
            "is_logged_in": true,
            "user_id": 7,
            "access_token": "stored-access",
            "refresh_token": "refresh"
        }),
    );

    cargo_bin_cmd!("courier")
        .env("COURIER_HOME", home.path())
        .env("COURIER_BASE_URL", server.uri())
        .env("COURIER_BLOCK_REAL_API", "1")
        .args(["deliveries", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_token_refresh_when_logged_out_fails() {
    let home = tempdir().unwrap();
    write_session(
        home.path(),
        &json!({
            "is_logged_in": false,
            "refresh_token": "leftover"
        }),
    );

    cargo_bin_cmd!("courier")
        .env("COURIER_HOME", home.path())
        .env("COURIER_BASE_URL", "http://127.0.0.1:9")
        .args(["token", "refresh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not logged in"));
}
