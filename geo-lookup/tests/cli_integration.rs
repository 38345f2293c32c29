// geo-lookup/tests/cli_integration.rs

use assert_cmd::prelude::OutputAssertExt;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::{NamedTempFile, TempDir};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Command with config discovery and GEO_* variables isolated from the host.
fn geo_lookup(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("geo-lookup").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env_remove("RUST_LOG");
    for key in [
        "GEO_CONCURRENCY",
        "GEO_TIMEOUT",
        "GEO_REQUEST_TIMEOUT",
        "GEO_ENDPOINT",
        "GEO_LANG",
        "GEO_JSON",
        "GEO_CSV",
        "GEO_FILE",
        "GEO_CONFIG",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

/// Helper to create a test address file
fn create_test_address_file(addresses: &[&str]) -> NamedTempFile {
    let file = NamedTempFile::new().expect("Failed to create temp file");
    fs::write(file.path(), addresses.join("\n")).expect("Failed to write to temp file");
    file
}

async fn mock_geo_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/json/bad-ip"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/json/[0-9.]+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "success",
            "country": "Canada",
            "regionName": "Quebec",
            "city": "Montreal",
            "lat": 45.6085,
            "lon": -73.5493,
            "isp": "Le Groupe Videotron Ltee"
        })))
        .mount(&server)
        .await;

    server
}

/// Run the blocking CLI off the runtime thread so the mock server keeps serving.
async fn run_blocking(mut cmd: Command) -> assert_cmd::assert::Assert {
    tokio::task::spawn_blocking(move || cmd.output())
        .await
        .expect("CLI task panicked")
        .expect("failed to run geo-lookup")
        .assert()
}

#[test]
fn test_help_shows_flags() {
    let home = TempDir::new().unwrap();
    geo_lookup(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--concurrency"))
        .stdout(predicate::str::contains("--request-timeout"))
        .stdout(predicate::str::contains("--endpoint"))
        .stdout(predicate::str::contains("--streaming"));
}

#[test]
fn test_no_input_is_error() {
    let home = TempDir::new().unwrap();
    geo_lookup(&home)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("You must specify addresses"));
}

#[test]
fn test_zero_concurrency_is_error() {
    let home = TempDir::new().unwrap();
    geo_lookup(&home)
        .args(["1.1.1.1", "-c", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Concurrency must be between 1 and 100"));
}

#[test]
fn test_streaming_with_json_is_error() {
    let home = TempDir::new().unwrap();
    geo_lookup(&home)
        .args(["1.1.1.1", "--streaming", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot use --streaming"));
}

#[test]
fn test_invalid_timeout_is_error() {
    let home = TempDir::new().unwrap();
    geo_lookup(&home)
        .args(["1.1.1.1", "--timeout", "forever"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid --timeout"));
}

#[test]
fn test_oversized_timeout_is_error() {
    let home = TempDir::new().unwrap();
    geo_lookup(&home)
        .args(["1.1.1.1", "--timeout", "18446744073709551615s"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid --timeout"));
}

#[test]
fn test_missing_file_is_error() {
    let home = TempDir::new().unwrap();
    geo_lookup(&home)
        .args(["--file", "does-not-exist.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.txt"));
}

#[test]
fn test_invalid_config_file_is_error() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bad.toml");
    fs::write(&config, "[defaults]\nconcurrency = 0\n").unwrap();

    geo_lookup(&home)
        .args(["1.1.1.1", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config file"));
}

#[test]
fn test_address_limit_requires_force() {
    let home = TempDir::new().unwrap();
    let addresses: Vec<String> = (0..10_001)
        .map(|i| format!("10.{}.{}.{}", i / 65536, (i / 256) % 256, i % 256))
        .collect();
    let refs: Vec<&str> = addresses.iter().map(String::as_str).collect();
    let file = create_test_address_file(&refs);

    geo_lookup(&home)
        .arg("--file")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_json_batch_against_mock_server() {
    let server = mock_geo_server().await;
    let home = TempDir::new().unwrap();

    let mut cmd = geo_lookup(&home);
    cmd.args(["1.1.1.1", "8.8.8.8", "bad-ip", "--json", "--endpoint"])
        .arg(format!("{}/json", server.uri()));

    let assert = run_blocking(cmd).await.success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let records: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let records = records.as_array().unwrap();

    assert_eq!(records.len(), 3);
    let located = records.iter().filter(|r| r.get("location").is_some()).count();
    assert_eq!(located, 2);

    let failed = records
        .iter()
        .find(|r| r["address"] == "bad-ip")
        .expect("bad-ip record");
    assert_eq!(failed["error_kind"], "status");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_streaming_text_summary() {
    let server = mock_geo_server().await;
    let home = TempDir::new().unwrap();

    let mut cmd = geo_lookup(&home);
    cmd.args(["1.1.1.1", "8.8.8.8", "-c", "1", "--endpoint"])
        .arg(format!("{}/json", server.uri()));

    run_blocking(cmd)
        .await
        .success()
        .stdout(predicate::str::contains("Montreal, Quebec, Canada"))
        .stdout(predicate::str::contains("[2/2]"))
        .stdout(predicate::str::contains("2 located"))
        .stdout(predicate::str::contains("0 failed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_csv_from_file_keeps_duplicates() {
    let server = mock_geo_server().await;
    let home = TempDir::new().unwrap();
    let file = create_test_address_file(&["# resolvers", "1.1.1.1", "", "1.1.1.1  # again"]);

    let mut cmd = geo_lookup(&home);
    cmd.arg("--csv")
        .arg("--file")
        .arg(file.path())
        .arg("--endpoint")
        .arg(format!("{}/json", server.uri()));

    let assert = run_blocking(cmd).await.success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();

    assert_eq!(lines[0], "address,status,country,region,city,lat,lon,isp,error");
    assert_eq!(lines.len(), 3);
    assert!(lines[1..].iter().all(|l| l.starts_with("1.1.1.1,success,Canada")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_env_and_config_file_select_output() {
    let server = mock_geo_server().await;
    let home = TempDir::new().unwrap();
    fs::write(
        home.path().join("geo-lookup.toml"),
        format!(
            "[defaults]\nendpoint = \"{}/json\"\n\n[output]\ndefault_format = \"csv\"\ncsv_headers = false\n",
            server.uri()
        ),
    )
    .unwrap();

    // discovered config file: CSV without headers
    let mut cmd = geo_lookup(&home);
    cmd.arg("1.1.1.1");
    run_blocking(cmd)
        .await
        .success()
        .stdout(predicate::str::starts_with("1.1.1.1,success,"));

    // GEO_JSON beats the file's default format
    let mut cmd = geo_lookup(&home);
    cmd.arg("1.1.1.1").env("GEO_JSON", "true");
    run_blocking(cmd)
        .await
        .success()
        .stdout(predicate::str::contains("\"address\": \"1.1.1.1\""));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failures_do_not_change_exit_code() {
    let server = mock_geo_server().await;
    let home = TempDir::new().unwrap();

    let mut cmd = geo_lookup(&home);
    cmd.args(["bad-ip", "also/bad", "--batch", "--endpoint"])
        .arg(format!("{}/json", server.uri()));

    run_blocking(cmd)
        .await
        .success()
        .stdout(predicate::str::contains("(HTTP 500)"))
        .stdout(predicate::str::contains("(invalid address)"))
        .stdout(predicate::str::contains("0 located"))
        .stdout(predicate::str::contains("2 failed"))
        .stdout(predicate::str::contains("Some addresses could not be located"));
}
