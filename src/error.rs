#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("MIME parse error: {0}")]
    Mime(#[from] mailparse::MailParseError),

    #[error("Recipient encoding error: {0}")]
    Recipients(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store unavailable")]
    Unavailable,
}
