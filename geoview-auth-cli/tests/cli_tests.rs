use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn geoview_auth() -> Command {
    let mut cmd = Command::cargo_bin("geoview-auth").unwrap();
    cmd.env_remove("GEOVIEW_AUTH_CONFIG")
        .env_remove("GEOVIEW_PASSWORD")
        .env("RUST_LOG", "warn");
    cmd
}

/// Write a config that keeps credentials in `store` and talks to `proxy_url`
fn write_config(dir: &Path, proxy_url: &str, store: &Path) -> String {
    let config_path = dir.join("config.json");
    let config = json!({
        "exchange": { "mode": "proxy", "proxy_url": proxy_url, "timeout_secs": 5 },
        "storage": { "backend": "file", "path": store.to_str().unwrap() },
        "logging": { "level": "warn", "format": "pretty" },
        "default_server": "https://x"
    });
    std::fs::write(&config_path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    config_path.to_str().unwrap().to_string()
}

/// Test configuration file initialization
#[test]
fn test_init_writes_default_config() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("geoview-auth.json");
    let config_path = config_path.to_str().unwrap();

    geoview_auth()
        .arg("init")
        .arg(config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration file"));

    let content = std::fs::read_to_string(config_path).unwrap();
    let config: Value = serde_json::from_str(&content).unwrap();

    assert!(config.get("exchange").is_some());
    assert!(config.get("cache").is_some());
    assert!(config.get("storage").is_some());
    assert!(config.get("logging").is_some());
    assert_eq!(config["exchange"]["mode"], "proxy");
    assert_eq!(config["cache"]["coalesce_exchanges"], true);
}

#[test]
fn test_init_refuses_to_overwrite() {
    let existing = NamedTempFile::new().unwrap();

    geoview_auth()
        .arg("init")
        .arg(existing.path().to_str().unwrap())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

/// Test invalid arguments produce proper error messages
#[test]
fn test_invalid_arguments() {
    geoview_auth().arg("--invalid-flag").assert().failure();
}

#[test]
fn test_invalid_config_file() {
    let config = NamedTempFile::new().unwrap();
    std::fs::write(config.path(), "{ invalid json }").unwrap();

    geoview_auth()
        .args(["--config", config.path().to_str().unwrap(), "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error loading configuration"));
}

#[test]
fn test_token_without_stored_credentials() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        "http://127.0.0.1:1/api/auth/arcgis",
        &dir.path().join("credentials.json"),
    );

    geoview_auth()
        .args(["--config", config.as_str(), "token"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No stored credentials found"));
}

#[test]
fn test_status_reports_missing_credentials() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        "http://127.0.0.1:1/api/auth/arcgis",
        &dir.path().join("credentials.json"),
    );

    let output = geoview_auth()
        .args(["--config", config.as_str(), "status", "--server", "https://y"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let status: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(status["server"], "https://y");
    assert_eq!(status["stored_credentials"], false);
    assert!(status["storage_key"]
        .as_str()
        .unwrap()
        .starts_with("arcgis_creds_"));
}

/// Login remembers credentials, a later process re-authenticates from them
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_login_remember_then_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/arcgis"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "token": "abc"})),
        )
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = dir.path().join("credentials.json");
    let config = write_config(dir.path(), &format!("{}/api/auth/arcgis", server.uri()), &store);

    geoview_auth()
        .args(["--config", config.as_str(), "login", "-u", "a", "--remember"])
        .env("GEOVIEW_PASSWORD", "b")
        .assert()
        .success()
        .stdout(predicate::str::contains("Credentials remembered"));

    assert!(store.exists());

    geoview_auth()
        .args(["--config", config.as_str(), "token"])
        .assert()
        .success()
        .stdout("abc\n");

    geoview_auth()
        .args(["--config", config.as_str(), "logout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stored credentials removed"));

    let status = geoview_auth()
        .args(["--config", config.as_str(), "status"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let status: Value = serde_json::from_slice(&status).unwrap();
    assert_eq!(status["stored_credentials"], false);

    geoview_auth()
        .args(["--config", config.as_str(), "token"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No stored credentials found"));
}

#[test]
fn test_logout_without_stored_credentials() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("credentials.json");
    let config = write_config(dir.path(), "http://127.0.0.1:1/api/auth/arcgis", &store);

    geoview_auth()
        .args(["--config", config.as_str(), "logout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No stored credentials for https://x"));

    assert!(!store.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_login_rejected_as_json() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/arcgis"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "bad creds"})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        &format!("{}/api/auth/arcgis", server.uri()),
        &dir.path().join("credentials.json"),
    );

    let output = geoview_auth()
        .args(["--config", config.as_str(), "login", "-u", "a", "--json"])
        .env("GEOVIEW_PASSWORD", "wrong")
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();

    let outcome: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(outcome, json!({"success": false, "error": "bad creds"}));
}
