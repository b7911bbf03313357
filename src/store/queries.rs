use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Statement};

use super::recipients::{decode_recipients, encode_recipients};
use crate::error::StoreError;
use crate::mime::{self, DecomposedPart};
use crate::models::{Message, MessagePart, MessageSummary, PartSummary};

/// Type recorded when the parser could not determine one.
pub const DEFAULT_MIME_TYPE: &str = "text/plain";

fn recipients_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: Option<String> = row.get(idx)?;
    decode_recipients(raw.as_deref())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn mime_type_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(row
        .get::<_, Option<String>>(idx)?
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()))
}

/// Expects: 0 id, 1 sender, 2 recipients, 3 subject, 4 source, 5 size,
/// 6 type, 7 created_at
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        sender: row.get(1)?,
        recipients: recipients_column(row, 2)?,
        subject: row.get(3)?,
        source: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        size: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
        mime_type: mime_type_column(row, 6)?,
        created_at: row.get(7)?,
    })
}

/// Expects: 0 id, 1 message_id, 2 cid, 3 type, 4 is_attachment, 5 filename,
/// 6 charset, 7 body, 8 size, 9 created_at
fn row_to_part(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessagePart> {
    Ok(MessagePart {
        id: row.get(0)?,
        message_id: row.get(1)?,
        cid: row.get(2)?,
        mime_type: mime_type_column(row, 3)?,
        is_attachment: row.get::<_, i64>(4)? != 0,
        filename: row.get(5)?,
        charset: row.get(6)?,
        body: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        size: row.get::<_, Option<i64>>(8)?.unwrap_or(0),
        created_at: row.get(9)?,
    })
}

fn row_to_part_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<PartSummary> {
    Ok(PartSummary {
        cid: row.get(0)?,
        mime_type: mime_type_column(row, 1)?,
        filename: row.get(2)?,
        size: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
    })
}

// -- ingestion -------------------------------------------------------------

/// Decompose `source` and store it with its parts in one transaction.
///
/// Returns the new message id. Nothing is written when parsing fails.
pub(super) fn do_add_message(
    conn: &Connection,
    sender: Option<&str>,
    recipients: &[String],
    source: &[u8],
) -> Result<i64, StoreError> {
    let decomposed = mime::decompose(source)?;
    let recipients_json = encode_recipients(recipients)?;
    let mime_type = decomposed
        .mime_type()
        .unwrap_or(DEFAULT_MIME_TYPE)
        .to_string();
    let text = String::from_utf8_lossy(source).into_owned();

    let tx = conn.unchecked_transaction()?;

    let message_id: i64 = tx
        .prepare_cached(
            "INSERT INTO message (sender, recipients, subject, source, type, size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING id",
        )?
        .query_row(
            rusqlite::params![
                sender,
                recipients_json,
                decomposed.subject,
                text,
                mime_type,
                source.len() as i64,
            ],
            |row| row.get(0),
        )?;

    // A message without sub-parts is its own single part.
    let parts = if decomposed.parts.is_empty() {
        vec![decomposed.envelope]
    } else {
        decomposed.parts
    };

    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO message_part
             (message_id, cid, type, is_attachment, filename, charset, body, size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for part in &parts {
            insert_part(&mut stmt, message_id, part)?;
        }
    }

    tx.commit()?;
    log::debug!(
        "Stored message {} ({} bytes, {} parts)",
        message_id,
        source.len(),
        parts.len()
    );
    Ok(message_id)
}

fn insert_part(
    stmt: &mut Statement<'_>,
    message_id: i64,
    part: &DecomposedPart,
) -> rusqlite::Result<()> {
    stmt.execute(rusqlite::params![
        message_id,
        part.cid,
        part.mime_type.as_deref().unwrap_or(DEFAULT_MIME_TYPE),
        part.is_attachment as i32,
        part.filename,
        part.charset,
        part.body,
        part.body.len() as i64,
    ])?;
    Ok(())
}

// -- messages ----------------------------------------------------------------

pub(super) fn do_list_messages(conn: &Connection) -> Result<Vec<MessageSummary>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, sender, recipients, subject, size, created_at
         FROM message
         ORDER BY created_at ASC, id ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(MessageSummary {
            id: row.get(0)?,
            sender: row.get(1)?,
            recipients: recipients_column(row, 2)?,
            subject: row.get(3)?,
            size: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
            created_at: row.get(5)?,
        })
    })?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}

pub(super) fn do_get_message(conn: &Connection, id: i64) -> Result<Option<Message>, StoreError> {
    let message = conn
        .prepare_cached(
            "SELECT id, sender, recipients, subject, source, size, type, created_at
             FROM message WHERE id = ?1 LIMIT 1",
        )?
        .query_row([id], row_to_message)
        .optional()?;
    Ok(message)
}

pub(super) fn do_latest_created_at(conn: &Connection) -> Result<Option<NaiveDateTime>, StoreError> {
    let latest = conn
        .prepare_cached("SELECT created_at FROM message ORDER BY created_at DESC, id DESC LIMIT 1")?
        .query_row([], |row| row.get(0))
        .optional()?;
    Ok(latest)
}

// -- parts -------------------------------------------------------------------

/// Parts ordered by filename; unnamed parts sort first.
pub(super) fn do_list_parts(conn: &Connection, message_id: i64) -> Result<Vec<PartSummary>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT cid, type, filename, size FROM message_part
         WHERE message_id = ?1
         ORDER BY filename ASC, id ASC",
    )?;
    let rows = stmt.query_map([message_id], row_to_part_summary)?;
    let parts = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(parts)
}

pub(super) fn do_list_attachments(
    conn: &Connection,
    message_id: i64,
) -> Result<Vec<PartSummary>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT cid, type, filename, size FROM message_part
         WHERE message_id = ?1 AND is_attachment = 1
         ORDER BY filename ASC, id ASC",
    )?;
    let rows = stmt.query_map([message_id], row_to_part_summary)?;
    let parts = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(parts)
}

pub(super) fn do_get_part(
    conn: &Connection,
    message_id: i64,
    part_id: i64,
) -> Result<Option<MessagePart>, StoreError> {
    let part = conn
        .prepare_cached(
            "SELECT id, message_id, cid, type, is_attachment, filename, charset, body, size, created_at
             FROM message_part WHERE message_id = ?1 AND id = ?2 LIMIT 1",
        )?
        .query_row([message_id, part_id], row_to_part)
        .optional()?;
    Ok(part)
}

/// First inline (non-attachment) part with exactly `mime_type`.
pub(super) fn do_get_part_by_type(
    conn: &Connection,
    message_id: i64,
    mime_type: &str,
) -> Result<Option<MessagePart>, StoreError> {
    let part = conn
        .prepare_cached(
            "SELECT id, message_id, cid, type, is_attachment, filename, charset, body, size, created_at
             FROM message_part
             WHERE message_id = ?1 AND type = ?2 AND is_attachment = 0
             ORDER BY id ASC LIMIT 1",
        )?
        .query_row(rusqlite::params![message_id, mime_type], row_to_part)
        .optional()?;
    Ok(part)
}

/// Exact content-id match over every part, attachments included.
pub(super) fn do_get_part_by_cid(
    conn: &Connection,
    message_id: i64,
    cid: &str,
) -> Result<Option<MessagePart>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, message_id, cid, type, is_attachment, filename, charset, body, size, created_at
         FROM message_part WHERE message_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([message_id], row_to_part)?;
    for row in rows {
        let part = row?;
        if part.cid.as_deref() == Some(cid) {
            return Ok(Some(part));
        }
    }
    Ok(None)
}

// -- deletion ----------------------------------------------------------------

pub(super) fn do_delete_all(conn: &Connection) -> Result<(), StoreError> {
    let tx = conn.unchecked_transaction()?;
    let parts = tx.prepare_cached("DELETE FROM message_part")?.execute([])?;
    let messages = tx.prepare_cached("DELETE FROM message")?.execute([])?;
    tx.commit()?;
    log::info!("Deleted all messages ({messages} messages, {parts} parts)");
    Ok(())
}

/// Remove one message and its parts. Unknown ids are a no-op.
pub(super) fn do_delete_message(conn: &Connection, id: i64) -> Result<(), StoreError> {
    let tx = conn.unchecked_transaction()?;
    tx.prepare_cached("DELETE FROM message_part WHERE message_id = ?1")?
        .execute([id])?;
    let removed = tx
        .prepare_cached("DELETE FROM message WHERE id = ?1")?
        .execute([id])?;
    tx.commit()?;
    if removed > 0 {
        log::debug!("Deleted message {id}");
    }
    Ok(())
}
