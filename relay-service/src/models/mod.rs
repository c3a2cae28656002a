pub mod ask;
pub mod notification;

pub use ask::{AskRequest, AskResponse, GenerationRequest, GenerationResult};
pub use notification::NotificationMessage;
