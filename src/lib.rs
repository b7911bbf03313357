pub mod config;
pub mod error;
pub mod mime;
pub mod models;
pub mod store;

pub use config::StoreConfig;
pub use error::StoreError;
pub use models::{BodyView, Message, MessagePart, MessageSummary, PartSummary};
pub use store::MailStore;
