use chrono::NaiveDateTime;
use tokio::sync::oneshot;

use crate::error::StoreError;
use crate::models::{BodyView, Message, MessagePart, MessageSummary, PartSummary};

pub(super) type Reply<T> = oneshot::Sender<Result<T, StoreError>>;

/// Work items for the store thread. One variant per logical operation.
pub(super) enum StoreCmd {
    AddMessage {
        sender: Option<String>,
        recipients: Vec<String>,
        source: Vec<u8>,
        reply: Reply<i64>,
    },
    ListMessages {
        reply: Reply<Vec<MessageSummary>>,
    },
    GetMessage {
        id: i64,
        reply: Reply<Option<Message>>,
    },
    LatestCreatedAt {
        reply: Reply<Option<NaiveDateTime>>,
    },
    ListParts {
        message_id: i64,
        reply: Reply<Vec<PartSummary>>,
    },
    ListAttachments {
        message_id: i64,
        reply: Reply<Vec<PartSummary>>,
    },
    GetPart {
        message_id: i64,
        part_id: i64,
        reply: Reply<Option<MessagePart>>,
    },
    GetPartByType {
        message_id: i64,
        mime_type: String,
        reply: Reply<Option<MessagePart>>,
    },
    GetPartByCid {
        message_id: i64,
        cid: String,
        reply: Reply<Option<MessagePart>>,
    },
    HasHtml {
        id: i64,
        reply: Reply<bool>,
    },
    HasPlain {
        id: i64,
        reply: Reply<bool>,
    },
    HtmlPart {
        id: i64,
        reply: Reply<Option<BodyView>>,
    },
    PlainPart {
        id: i64,
        reply: Reply<Option<MessagePart>>,
    },
    DeleteAll {
        reply: Reply<()>,
    },
    DeleteMessage {
        id: i64,
        reply: Reply<()>,
    },
}
