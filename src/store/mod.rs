mod commands;
mod handle;
mod negotiation;
mod notify;
mod queries;
mod recipients;
mod schema;

pub use handle::MailStore;
pub use negotiation::{HTML_TYPES, PLAIN_TYPE};
pub use queries::DEFAULT_MIME_TYPE;
pub use recipients::{decode_recipients, encode_recipients};
