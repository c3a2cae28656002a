pub mod providers;

pub use providers::{
    EmailMessage, EmailProvider, GenerationProvider, MockEmailProvider, OllamaProvider,
    ProviderError, ProviderResponse, SmtpProvider, HEALTH_CHECK_TIMEOUT,
};
