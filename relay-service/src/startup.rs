//! Application startup and lifecycle management.
//!
//! Startup is gated: the downstream generation service is probed and TLS
//! material is loaded before the listening socket is bound, so a failed
//! start never leaves a port open.

use crate::config::{CorsConfig, RelayConfig, TlsConfig};
use crate::error::RelayError;
use crate::handlers;
use crate::services::{
    EmailProvider, GenerationProvider, OllamaProvider, SmtpProvider, HEALTH_CHECK_TIMEOUT,
};
use axum::{
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use axum_server::tls_rustls::{from_tcp_rustls, RustlsConfig};
use axum_server::Handle;
use service_core::middleware::{
    create_ip_rate_limiter, ip_rate_limit_middleware, request_id_middleware,
    security_headers_middleware, IpRateLimitState, REQUEST_ID_HEADER,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state, immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<dyn GenerationProvider>,
    /// `None` when no mail credentials are configured.
    pub email_provider: Option<Arc<dyn EmailProvider>>,
}

fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| match o.parse() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

pub fn build_router(state: AppState, config: &RelayConfig) -> Router {
    let limiter = create_ip_rate_limiter(
        config.rate_limit.max_requests,
        config.rate_limit.window_secs,
    );
    let rate_limit = IpRateLimitState::new(limiter, config.rate_limit.trust_proxy);

    let ask_routes = Router::new()
        .route("/ask", post(handlers::ask))
        .route_layer(from_fn_with_state(rate_limit, ip_rate_limit_middleware));

    Router::new()
        .merge(ask_routes)
        .route("/health", get(handlers::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(build_cors_layer(&config.cors))
}

async fn load_tls(config: &TlsConfig) -> Result<RustlsConfig, RelayError> {
    let (Some(cert_path), Some(key_path)) = (&config.cert_path, &config.key_path) else {
        return Err(RelayError::StartupFailure(
            "TLS is enabled but certificate or key path is missing".to_string(),
        ));
    };

    RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| {
            tracing::error!(
                cert_path = %cert_path.display(),
                key_path = %key_path.display(),
                error = %e,
                "Failed to load TLS certificate material"
            );
            RelayError::StartupFailure(format!("Failed to load TLS certificate material: {}", e))
        })
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: std::net::TcpListener,
    tls: Option<RustlsConfig>,
    router: Router,
}

impl Application {
    /// Build the application with providers derived from configuration.
    pub async fn build(config: RelayConfig) -> Result<Self, RelayError> {
        let generator = OllamaProvider::new(config.ollama.clone())
            .map_err(|e| RelayError::StartupFailure(e.to_string()))?;

        let email_provider: Option<Arc<dyn EmailProvider>> = match &config.smtp {
            Some(smtp) => {
                let provider = SmtpProvider::new(smtp.clone())
                    .map_err(|e| RelayError::StartupFailure(e.to_string()))?;
                tracing::info!(host = %smtp.host, "SMTP email provider initialized");
                Some(Arc::new(provider))
            }
            None => {
                tracing::info!("Email credentials not set, email notifications disabled");
                None
            }
        };

        Self::build_with_providers(config, Arc::new(generator), email_provider).await
    }

    /// Build the application around explicitly supplied collaborators.
    pub async fn build_with_providers(
        config: RelayConfig,
        generator: Arc<dyn GenerationProvider>,
        email_provider: Option<Arc<dyn EmailProvider>>,
    ) -> Result<Self, RelayError> {
        let base_url = &config.ollama.base_url;
        let probe = tokio::time::timeout(HEALTH_CHECK_TIMEOUT, generator.health_check()).await;
        match probe {
            Ok(Ok(())) => tracing::info!(base_url = %base_url, "Generation service is reachable"),
            Ok(Err(e)) => {
                tracing::error!(base_url = %base_url, error = %e, "Generation service is unreachable");
                return Err(RelayError::StartupFailure(format!(
                    "Generation service at {} is unreachable: {}",
                    base_url, e
                )));
            }
            Err(_) => {
                tracing::error!(base_url = %base_url, "Generation service health check timed out");
                return Err(RelayError::StartupFailure(format!(
                    "Generation service at {} did not answer within {:?}",
                    base_url, HEALTH_CHECK_TIMEOUT
                )));
            }
        }

        let tls = if config.tls.enabled {
            Some(load_tls(&config.tls).await?)
        } else {
            None
        };

        // Port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = std::net::TcpListener::bind(addr).map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            RelayError::StartupFailure(format!("Failed to bind {}: {}", addr, e))
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|e| RelayError::StartupFailure(e.to_string()))?;
        let port = listener
            .local_addr()
            .map_err(|e| RelayError::StartupFailure(e.to_string()))?
            .port();

        let state = AppState {
            generator,
            email_provider,
        };
        let router = build_router(state, &config);

        Ok(Self {
            port,
            listener,
            tls,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run until SIGINT or SIGTERM, then drain in-flight requests.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` resolves, then drain in-flight requests.
    pub async fn run_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let port = self.port;
        let make_service = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        match self.tls {
            None => {
                let listener = TcpListener::from_std(self.listener)?;
                tracing::info!(port, "Listening over HTTP");
                axum::serve(listener, make_service)
                    .with_graceful_shutdown(shutdown)
                    .await?;
            }
            Some(tls) => {
                let handle = Handle::new();
                let shutdown_handle = handle.clone();
                tokio::spawn(async move {
                    shutdown.await;
                    shutdown_handle.graceful_shutdown(None);
                });

                tracing::info!(port, "Listening over HTTPS");
                from_tcp_rustls(self.listener, tls)
                    .handle(handle)
                    .serve(make_service)
                    .await?;
            }
        }

        tracing::info!("Service shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
