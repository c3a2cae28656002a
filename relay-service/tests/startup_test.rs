mod common;

use common::{healthy_downstream, test_config, unused_port, TestApp};
use relay_service::error::RelayError;
use relay_service::startup::Application;
use std::net::TcpStream;
use std::process::Command;

fn port_is_closed(port: u16) -> bool {
    TcpStream::connect(("127.0.0.1", port)).is_err()
}

#[tokio::test]
async fn unreachable_downstream_prevents_startup() {
    let downstream = format!("http://127.0.0.1:{}", unused_port());
    let port = unused_port();
    let mut config = test_config(&downstream, &[]);
    config.common.port = port;

    let result = Application::build(config).await;

    assert!(matches!(result, Err(RelayError::StartupFailure(_))));
    assert!(port_is_closed(port));
}

#[tokio::test]
async fn unreadable_certificates_prevent_startup() {
    let downstream = healthy_downstream().await;
    let port = unused_port();
    let mut config = test_config(
        &downstream.uri(),
        &[
            ("TLS_ENABLED", "true"),
            ("SSL_CERT_PATH", "/nonexistent/cert.pem"),
            ("SSL_KEY_PATH", "/nonexistent/key.pem"),
        ],
    );
    config.common.port = port;

    let result = Application::build(config).await;

    match result {
        Err(RelayError::StartupFailure(msg)) => assert!(msg.contains("certificate")),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("startup should fail without certificate material"),
    }
    assert!(port_is_closed(port));
}

#[tokio::test]
async fn reachable_downstream_binds_port() {
    let downstream = healthy_downstream().await;
    let app = Application::build(test_config(&downstream.uri(), &[]))
        .await
        .expect("Failed to build application");

    assert_ne!(app.port(), 0);
}

#[tokio::test]
async fn serves_https_when_tls_is_enabled() {
    let cert = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/cert.pem");
    let key = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/key.pem");
    let app = TestApp::spawn_with(
        None,
        &[
            ("TLS_ENABLED", "true"),
            ("SSL_CERT_PATH", cert),
            ("SSL_KEY_PATH", key),
        ],
    )
    .await;

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .unwrap();
    let response = client
        .get(format!("https://localhost:{}/health", app.port))
        .send()
        .await
        .expect("Failed to execute request over https");

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[test]
fn binary_exits_with_status_one_when_downstream_is_down() {
    let port = unused_port();

    let output = Command::new(env!("CARGO_BIN_EXE_relay-service"))
        .env_clear()
        .env("APP__PORT", port.to_string())
        .env(
            "OLLAMA_BASE_URL",
            format!("http://127.0.0.1:{}", unused_port()),
        )
        .output()
        .expect("Failed to run relay-service binary");

    assert_eq!(output.status.code(), Some(1));
    assert!(port_is_closed(port));
}

#[test]
fn binary_reads_settings_from_dotenv_file() {
    let port = unused_port();
    let downstream = format!("http://127.0.0.1:{}", unused_port());
    let dir = std::env::temp_dir().join(format!("relay-service-dotenv-{}", port));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(".env"),
        format!("APP__PORT={}\nOLLAMA_BASE_URL={}\n", port, downstream),
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_relay-service"))
        .env_clear()
        .current_dir(&dir)
        .output()
        .expect("Failed to run relay-service binary");
    std::fs::remove_dir_all(&dir).ok();

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&downstream));
    assert!(port_is_closed(port));
}
