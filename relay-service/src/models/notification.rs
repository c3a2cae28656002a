use chrono::{DateTime, Utc};
use maud::{html, DOCTYPE};

use crate::services::EmailMessage;

pub const EMAIL_SUBJECT: &str = "Your AI response";

/// A generated response rendered for delivery by email.
#[derive(Debug, Clone)]
pub struct NotificationMessage {
    pub prompt: String,
    pub response: String,
    pub generated_at: DateTime<Utc>,
}

impl NotificationMessage {
    pub fn new(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        Self::at(prompt, response, Utc::now())
    }

    pub fn at(
        prompt: impl Into<String>,
        response: impl Into<String>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            response: response.into(),
            generated_at,
        }
    }

    pub fn timestamp(&self) -> String {
        self.generated_at
            .format("%A, %B %-d, %Y at %H:%M:%S UTC")
            .to_string()
    }

    pub fn render_text(&self) -> String {
        format!(
            "Your prompt:\n{}\n\nResponse:\n{}\n\nGenerated on {}\n",
            self.prompt,
            self.response,
            self.timestamp()
        )
    }

    pub fn render_html(&self) -> String {
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="UTF-8" {}
                    title { (EMAIL_SUBJECT) }
                }
                body style="font-family: sans-serif; line-height: 1.5;" {
                    h2 { "Your prompt" }
                    blockquote style="white-space: pre-wrap;" { (self.prompt) }
                    h2 { "Response" }
                    div style="white-space: pre-wrap;" { (self.response) }
                    p style="color: #666; font-size: 0.9em;" {
                        "Generated on " (self.timestamp())
                    }
                }
            }
        }
        .into_string()
    }

    /// Builds a multipart email carrying both renderings.
    pub fn to_email(&self, to: &str) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: EMAIL_SUBJECT.to_string(),
            body_text: self.render_text(),
            body_html: Some(self.render_html()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message() -> NotificationMessage {
        let at = Utc.with_ymd_and_hms(2025, 3, 7, 14, 5, 9).unwrap();
        NotificationMessage::at("Why is the sky blue?", "Rayleigh scattering.", at)
    }

    #[test]
    fn test_timestamp_is_human_readable() {
        assert_eq!(message().timestamp(), "Friday, March 7, 2025 at 14:05:09 UTC");
    }

    #[test]
    fn test_text_contains_prompt_response_and_time() {
        let text = message().render_text();

        assert!(text.contains("Why is the sky blue?"));
        assert!(text.contains("Rayleigh scattering."));
        assert!(text.contains("March 7, 2025"));
    }

    #[test]
    fn test_html_escapes_content() {
        let msg = NotificationMessage::at("<script>x</script>", "a & b", Utc::now());
        let html = msg.render_html();

        assert!(html.contains("&lt;script&gt;x&lt;/script&gt;"));
        assert!(html.contains("a &amp; b"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_email_always_has_plain_text() {
        let email = message().to_email("user@example.com");

        assert_eq!(email.to, "user@example.com");
        assert_eq!(email.subject, EMAIL_SUBJECT);
        assert!(email.body_text.contains("Rayleigh scattering."));
        assert!(email.body_html.is_some());
    }
}
