use super::{EmailMessage, EmailProvider, ProviderError, ProviderResponse};
use crate::config::SmtpConfig;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

pub struct SmtpProvider {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpProvider {
    pub fn new(config: SmtpConfig) -> Result<Self, ProviderError> {
        let from: Mailbox = config
            .from_email
            .parse()
            .map_err(|e| ProviderError::Configuration(format!("Invalid from address: {}", e)))?;

        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| {
                ProviderError::Configuration(format!("Failed to create SMTP relay: {}", e))
            })?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self { from, transport })
    }

    fn build_message(&self, email: &EmailMessage) -> Result<Message, ProviderError> {
        let to_mailbox: Mailbox = email
            .to
            .parse()
            .map_err(|e| ProviderError::InvalidRecipient(format!("Invalid recipient: {}", e)))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(&email.subject);

        let message = match &email.body_html {
            Some(html) => builder.multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.body_text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.clone()),
                    ),
            ),
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(email.body_text.clone()),
        };

        message.map_err(|e| ProviderError::SendFailed(format!("Failed to build message: {}", e)))
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, email: &EmailMessage) -> Result<ProviderResponse, ProviderError> {
        let message = self.build_message(email)?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| ProviderError::SendFailed(format!("Failed to send email: {}", e)))?;

        let provider_id = response.message().next().map(|s| s.to_string());

        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Email sent successfully"
        );

        Ok(ProviderResponse { provider_id })
    }
}

/// In-memory email provider that records every message it is handed.
pub struct MockEmailProvider {
    fail: bool,
    send_count: AtomicU64,
    sent: Mutex<Vec<EmailMessage>>,
}

impl MockEmailProvider {
    pub fn new() -> Self {
        Self {
            fail: false,
            send_count: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose transport rejects every send.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }
}

impl Default for MockEmailProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, email: &EmailMessage) -> Result<ProviderResponse, ProviderError> {
        self.send_count.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(ProviderError::SendFailed(
                "Mock transport rejected the message".to_string(),
            ));
        }

        self.sent.lock().await.push(email.clone());

        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "[MOCK] Email would be sent"
        );

        Ok(ProviderResponse {
            provider_id: Some(format!("mock-email-{}", self.send_count())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp_config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.test.local".to_string(),
            port: 587,
            user: "bot@example.com".to_string(),
            password: "secret".to_string(),
            from_email: "bot@example.com".to_string(),
        }
    }

    fn email(html: Option<&str>) -> EmailMessage {
        EmailMessage {
            to: "user@example.com".to_string(),
            subject: "Subject".to_string(),
            body_text: "plain body".to_string(),
            body_html: html.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_builds_multipart_alternative() {
        let provider = SmtpProvider::new(smtp_config()).unwrap();
        let message = provider.build_message(&email(Some("<p>html body</p>"))).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("plain body"));
        assert!(raw.contains("<p>html body</p>"));
    }

    #[tokio::test]
    async fn test_rejects_invalid_recipient() {
        let provider = SmtpProvider::new(smtp_config()).unwrap();
        let mut bad = email(None);
        bad.to = "not-an-email".to_string();

        assert!(matches!(
            provider.build_message(&bad),
            Err(ProviderError::InvalidRecipient(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_from_address() {
        let mut config = smtp_config();
        config.from_email = "nope".to_string();

        assert!(matches!(
            SmtpProvider::new(config),
            Err(ProviderError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_records_sends() {
        let provider = MockEmailProvider::new();
        provider.send(&email(None)).await.unwrap();

        assert_eq!(provider.send_count(), 1);
        assert_eq!(provider.sent().await[0].to, "user@example.com");
    }

    #[tokio::test]
    async fn test_failing_mock_rejects() {
        let provider = MockEmailProvider::failing();

        assert!(provider.send(&email(None)).await.is_err());
        assert_eq!(provider.send_count(), 1);
        assert!(provider.sent().await.is_empty());
    }
}
