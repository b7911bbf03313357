use chrono::NaiveDateTime;
use rusqlite::Connection;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::commands::{Reply, StoreCmd};
use super::negotiation;
use super::notify::spawn_notifier;
use super::queries;
use super::schema::initialize_schema;
use crate::config::{DatabaseTarget, StoreConfig};
use crate::error::StoreError;
use crate::models::{BodyView, Message, MessagePart, MessageSummary, PartSummary};

/// One cache slot per logical query, with room to spare.
const STATEMENT_CACHE_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// MailStore: Clone + Send + Sync async facade
// ---------------------------------------------------------------------------

/// Handle to the message store.
///
/// All operations are executed one at a time on a dedicated thread that owns
/// the SQLite connection, so a reader never sees a message whose parts are
/// still being written.
#[derive(Clone)]
pub struct MailStore {
    tx: mpsc::UnboundedSender<StoreCmd>,
    events: broadcast::Sender<Message>,
}

impl MailStore {
    /// Connect, reset the schema and spawn the store and notifier threads.
    ///
    /// Any existing messages in the target database are dropped.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let target = config.target()?;
        let conn = connect(&target)?;
        conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);

        initialize_schema(&conn)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.notify_capacity.max(1));

        std::thread::Builder::new()
            .name("mailcatcher-store".into())
            .spawn(move || run_loop(conn, rx, notify_tx))?;

        spawn_notifier(tx.downgrade(), notify_rx, events.clone())?;

        log::info!("Message store ready ({target:?})");
        Ok(MailStore { tx, events })
    }

    /// Receive every message stored after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        cmd: impl FnOnce(Reply<T>) -> StoreCmd,
    ) -> Result<T, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(cmd(reply))
            .map_err(|_| StoreError::Unavailable)?;
        rx.await.map_err(|_| StoreError::Unavailable)?
    }

    // -- ingestion -----------------------------------------------------------

    /// Store a raw captured message and return its id.
    ///
    /// Subscribers are notified after the write commits; this call does not
    /// wait for them.
    pub async fn add_message(
        &self,
        sender: Option<String>,
        recipients: Vec<String>,
        source: impl Into<Vec<u8>>,
    ) -> Result<i64, StoreError> {
        let source = source.into();
        self.request(|reply| StoreCmd::AddMessage {
            sender,
            recipients,
            source,
            reply,
        })
        .await
    }

    // -- queries -------------------------------------------------------------

    /// All messages, oldest first.
    pub async fn messages(&self) -> Result<Vec<MessageSummary>, StoreError> {
        self.request(|reply| StoreCmd::ListMessages { reply }).await
    }

    pub async fn message(&self, id: i64) -> Result<Option<Message>, StoreError> {
        self.request(|reply| StoreCmd::GetMessage { id, reply }).await
    }

    /// Creation time of the newest message, if any.
    pub async fn latest_created_at(&self) -> Result<Option<NaiveDateTime>, StoreError> {
        self.request(|reply| StoreCmd::LatestCreatedAt { reply })
            .await
    }

    /// Parts of a message sorted by filename.
    pub async fn message_parts(&self, message_id: i64) -> Result<Vec<PartSummary>, StoreError> {
        self.request(|reply| StoreCmd::ListParts { message_id, reply })
            .await
    }

    pub async fn message_attachments(
        &self,
        message_id: i64,
    ) -> Result<Vec<PartSummary>, StoreError> {
        self.request(|reply| StoreCmd::ListAttachments { message_id, reply })
            .await
    }

    pub async fn message_part(
        &self,
        message_id: i64,
        part_id: i64,
    ) -> Result<Option<MessagePart>, StoreError> {
        self.request(|reply| StoreCmd::GetPart {
            message_id,
            part_id,
            reply,
        })
        .await
    }

    /// First inline part whose type is exactly `mime_type`.
    pub async fn message_part_by_type(
        &self,
        message_id: i64,
        mime_type: impl Into<String>,
    ) -> Result<Option<MessagePart>, StoreError> {
        let mime_type = mime_type.into();
        self.request(|reply| StoreCmd::GetPartByType {
            message_id,
            mime_type,
            reply,
        })
        .await
    }

    /// Resolve a `cid:` reference. Attachments are included.
    pub async fn message_part_by_cid(
        &self,
        message_id: i64,
        cid: impl Into<String>,
    ) -> Result<Option<MessagePart>, StoreError> {
        let cid = cid.into();
        self.request(|reply| StoreCmd::GetPartByCid {
            message_id,
            cid,
            reply,
        })
        .await
    }

    // -- content negotiation -------------------------------------------------

    pub async fn has_html(&self, id: i64) -> Result<bool, StoreError> {
        self.request(|reply| StoreCmd::HasHtml { id, reply }).await
    }

    pub async fn has_plain(&self, id: i64) -> Result<bool, StoreError> {
        self.request(|reply| StoreCmd::HasPlain { id, reply }).await
    }

    pub async fn html_part(&self, id: i64) -> Result<Option<BodyView>, StoreError> {
        self.request(|reply| StoreCmd::HtmlPart { id, reply }).await
    }

    pub async fn plain_part(&self, id: i64) -> Result<Option<MessagePart>, StoreError> {
        self.request(|reply| StoreCmd::PlainPart { id, reply }).await
    }

    // -- deletion ------------------------------------------------------------

    /// Remove every message and part.
    pub async fn delete_all(&self) -> Result<(), StoreError> {
        self.request(|reply| StoreCmd::DeleteAll { reply }).await
    }

    /// Remove one message and its parts. Unknown ids are ignored.
    pub async fn delete_message(&self, id: i64) -> Result<(), StoreError> {
        self.request(|reply| StoreCmd::DeleteMessage { id, reply })
            .await
    }
}

fn connect(target: &DatabaseTarget) -> Result<Connection, StoreError> {
    match target {
        DatabaseTarget::Memory => Ok(Connection::open_in_memory()?),
        DatabaseTarget::File(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Ok(Connection::open(path)?)
        }
    }
}

// -- background thread ---------------------------------------------------

fn run_loop(
    conn: Connection,
    mut rx: mpsc::UnboundedReceiver<StoreCmd>,
    notify: mpsc::UnboundedSender<i64>,
) {
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            StoreCmd::AddMessage {
                sender,
                recipients,
                source,
                reply,
            } => {
                let result =
                    queries::do_add_message(&conn, sender.as_deref(), &recipients, &source);
                let stored = result.as_ref().ok().copied();
                let _ = reply.send(result);
                if let Some(id) = stored {
                    if notify.send(id).is_err() {
                        log::debug!("Notifier gone, message {id} not announced");
                    }
                }
            }
            StoreCmd::ListMessages { reply } => {
                let _ = reply.send(queries::do_list_messages(&conn));
            }
            StoreCmd::GetMessage { id, reply } => {
                let _ = reply.send(queries::do_get_message(&conn, id));
            }
            StoreCmd::LatestCreatedAt { reply } => {
                let _ = reply.send(queries::do_latest_created_at(&conn));
            }
            StoreCmd::ListParts { message_id, reply } => {
                let _ = reply.send(queries::do_list_parts(&conn, message_id));
            }
            StoreCmd::ListAttachments { message_id, reply } => {
                let _ = reply.send(queries::do_list_attachments(&conn, message_id));
            }
            StoreCmd::GetPart {
                message_id,
                part_id,
                reply,
            } => {
                let _ = reply.send(queries::do_get_part(&conn, message_id, part_id));
            }
            StoreCmd::GetPartByType {
                message_id,
                mime_type,
                reply,
            } => {
                let _ = reply.send(queries::do_get_part_by_type(&conn, message_id, &mime_type));
            }
            StoreCmd::GetPartByCid {
                message_id,
                cid,
                reply,
            } => {
                let _ = reply.send(queries::do_get_part_by_cid(&conn, message_id, &cid));
            }
            StoreCmd::HasHtml { id, reply } => {
                let _ = reply.send(negotiation::do_has_html(&conn, id));
            }
            StoreCmd::HasPlain { id, reply } => {
                let _ = reply.send(negotiation::do_has_plain(&conn, id));
            }
            StoreCmd::HtmlPart { id, reply } => {
                let _ = reply.send(negotiation::do_html_part(&conn, id));
            }
            StoreCmd::PlainPart { id, reply } => {
                let _ = reply.send(negotiation::do_plain_part(&conn, id));
            }
            StoreCmd::DeleteAll { reply } => {
                let _ = reply.send(queries::do_delete_all(&conn));
            }
            StoreCmd::DeleteMessage { id, reply } => {
                let _ = reply.send(queries::do_delete_message(&conn, id));
            }
        }
    }
    log::debug!("Store thread exiting");
}
