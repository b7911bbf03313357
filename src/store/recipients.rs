/// Recipients are kept as a JSON array in a single text column.
pub fn encode_recipients(recipients: &[String]) -> Result<String, serde_json::Error> {
    serde_json::to_string(recipients)
}

/// NULL decodes to an empty list.
pub fn decode_recipients(column: Option<&str>) -> Result<Vec<String>, serde_json::Error> {
    match column {
        Some(json) => serde_json::from_str(json),
        None => Ok(Vec::new()),
    }
}
