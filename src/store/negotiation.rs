use rusqlite::{Connection, OptionalExtension};

use super::queries::{do_get_message, do_get_part_by_type};
use crate::error::StoreError;
use crate::models::{BodyView, MessagePart};

/// HTML renderings, in order of preference.
pub const HTML_TYPES: [&str; 2] = ["text/html", "application/xhtml+xml"];

pub const PLAIN_TYPE: &str = "text/plain";

fn message_type(conn: &Connection, id: i64) -> Result<Option<String>, StoreError> {
    let ty = conn
        .prepare_cached("SELECT type FROM message WHERE id = ?1 LIMIT 1")?
        .query_row([id], |row| row.get::<_, Option<String>>(0))
        .optional()?;
    Ok(ty.flatten())
}

pub(super) fn do_has_html(conn: &Connection, id: i64) -> Result<bool, StoreError> {
    let has_part = conn
        .prepare_cached(
            "SELECT 1 FROM message_part
             WHERE message_id = ?1 AND is_attachment = 0
               AND type IN ('text/html', 'application/xhtml+xml')
             LIMIT 1",
        )?
        .exists([id])?;
    if has_part {
        return Ok(true);
    }
    Ok(message_type(conn, id)?.is_some_and(|ty| HTML_TYPES.contains(&ty.as_str())))
}

pub(super) fn do_has_plain(conn: &Connection, id: i64) -> Result<bool, StoreError> {
    let has_part = conn
        .prepare_cached(
            "SELECT 1 FROM message_part
             WHERE message_id = ?1 AND is_attachment = 0 AND type = 'text/plain'
             LIMIT 1",
        )?
        .exists([id])?;
    if has_part {
        return Ok(true);
    }
    Ok(message_type(conn, id)?.as_deref() == Some(PLAIN_TYPE))
}

/// The HTML part, else the XHTML part, else the message itself when its own
/// type is HTML.
pub(super) fn do_html_part(conn: &Connection, id: i64) -> Result<Option<BodyView>, StoreError> {
    for ty in HTML_TYPES {
        if let Some(part) = do_get_part_by_type(conn, id, ty)? {
            return Ok(Some(BodyView::Part(part)));
        }
    }

    let message = do_get_message(conn, id)?
        .filter(|m| HTML_TYPES.contains(&m.mime_type.as_str()))
        .map(BodyView::Message);
    Ok(message)
}

/// No message-level fallback here; single-part plain messages already carry
/// a synthetic `text/plain` part.
pub(super) fn do_plain_part(conn: &Connection, id: i64) -> Result<Option<MessagePart>, StoreError> {
    do_get_part_by_type(conn, id, PLAIN_TYPE)
}
