#![allow(dead_code)]

use relay_service::config::RelayConfig;
use relay_service::services::{EmailProvider, MockEmailProvider};
use relay_service::startup::Application;
use service_core::config::Config as CoreConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub downstream: MockServer,
    pub email: Option<Arc<MockEmailProvider>>,
    shutdown: Option<oneshot::Sender<()>>,
}

/// Starts a fake generation service that passes the startup probe.
pub async fn healthy_downstream() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "models": [] })))
        .mount(&server)
        .await;
    server
}

/// Configuration pointing at `downstream`, on a random port.
pub fn test_config(base_url: &str, overrides: &[(&str, &str)]) -> RelayConfig {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("OLLAMA_BASE_URL".to_string(), base_url.to_string());
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    RelayConfig::from_source(CoreConfig { port: 0 }, |key| vars.get(key).cloned())
        .expect("Failed to build test configuration")
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(None, &[]).await
    }

    pub async fn spawn_with_email(email: Arc<MockEmailProvider>) -> Self {
        Self::spawn_with(Some(email), &[]).await
    }

    pub async fn spawn_with(
        email: Option<Arc<MockEmailProvider>>,
        overrides: &[(&str, &str)],
    ) -> Self {
        let downstream = healthy_downstream().await;
        let config = test_config(&downstream.uri(), overrides);

        let generator = Arc::new(
            relay_service::services::OllamaProvider::new(config.ollama.clone())
                .expect("Failed to build Ollama provider"),
        );
        let email_provider = email.clone().map(|p| p as Arc<dyn EmailProvider>);

        let app = Application::build_with_providers(config, generator, email_provider)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            app.run_until(async move {
                rx.await.ok();
            })
            .await
            .ok();
        });

        TestApp {
            address: format!("http://127.0.0.1:{}", port),
            port,
            downstream,
            email,
            shutdown: Some(tx),
        }
    }

    /// Make the fake generation service answer `/api/generate` with `text`.
    pub async fn mock_generation(&self, text: &str) {
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "m",
                "response": text,
                "done": true
            })))
            .mount(&self.downstream)
            .await;
    }

    pub async fn post_ask(&self, body: serde_json::Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/ask", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
    }
}

/// A loopback port with nothing listening on it.
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind probe port");
    listener.local_addr().unwrap().port()
}
