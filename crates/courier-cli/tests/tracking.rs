use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_track_stops_after_requested_ticks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tracking/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deliveryId": 5,
            "status": "IN_TRANSIT",
            "courierLocation": {"latitude": 38.5, "longitude": -120.2},
            "etaMinutes": 12
        })))
        .expect(2)
        .mount(&server)
        .await;

    let home = tempdir().unwrap();

    cargo_bin_cmd!("courier")
        .env("COURIER_HOME", home.path())
        .env("COURIER_BASE_URL", server.uri())
        .env("COURIER_BLOCK_REAL_API", "1")
        .args(["track", "5", "--ticks", "2", "--interval", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("courier 38.50000,-120.20000"))
        .stdout(predicate::str::contains("eta 12 min"));
}

#[tokio::test]
async fn test_track_prints_failed_polls_and_continues() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tracking/5"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let home = tempdir().unwrap();

    cargo_bin_cmd!("courier")
        .env("COURIER_HOME", home.path())
        .env("COURIER_BASE_URL", server.uri())
        .env("COURIER_BLOCK_REAL_API", "1")
        .args(["track", "5", "--ticks", "2", "--interval", "1"])
        .assert()
        .success()
        .stderr(predicate::str::contains("poll failed: HTTP 503"));
}

#[test]
fn test_track_rejects_zero_interval() {
    let home = tempdir().unwrap();

    cargo_bin_cmd!("courier")
        .env("COURIER_HOME", home.path())
        .env("COURIER_BASE_URL", "http://127.0.0.1:9")
        .args(["track", "5", "--interval", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--interval"));
}
