use tokio::sync::{broadcast, mpsc, oneshot};

use super::commands::StoreCmd;
use crate::error::StoreError;
use crate::models::Message;

/// Attempts at re-reading a freshly stored message before giving up.
const FETCH_ATTEMPTS: usize = 3;

/// Start the notifier thread.
///
/// It receives ids of committed messages, reads them back through the store
/// queue and publishes them to subscribers. Holding only a weak sender lets
/// the store thread exit once every `MailStore` is dropped, which in turn
/// closes `ids` and ends this thread.
pub(super) fn spawn_notifier(
    store: mpsc::WeakUnboundedSender<StoreCmd>,
    mut ids: mpsc::UnboundedReceiver<i64>,
    events: broadcast::Sender<Message>,
) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("mailcatcher-notify".into())
        .spawn(move || {
            while let Some(id) = ids.blocking_recv() {
                deliver(&events, id, |id| fetch_message(&store, id));
            }
            log::debug!("Notifier thread exiting");
        })?;
    Ok(())
}

/// Publish message `id`, retrying the read a bounded number of times.
///
/// Returns whether a message was handed to the channel.
fn deliver<F>(events: &broadcast::Sender<Message>, id: i64, mut fetch: F) -> bool
where
    F: FnMut(i64) -> Result<Option<Message>, StoreError>,
{
    for attempt in 1..=FETCH_ATTEMPTS {
        match fetch(id) {
            Ok(Some(message)) => {
                if events.send(message).is_err() {
                    log::trace!("No subscribers for message {id}");
                }
                return true;
            }
            Ok(None) => {
                log::debug!("Message {id} gone before notification");
                return false;
            }
            Err(StoreError::Unavailable) => {
                log::debug!("Store closed before notifying message {id}");
                return false;
            }
            Err(e) => {
                log::warn!("Failed to load message {id} for notification (attempt {attempt}): {e}");
            }
        }
    }
    false
}

fn fetch_message(
    store: &mpsc::WeakUnboundedSender<StoreCmd>,
    id: i64,
) -> Result<Option<Message>, StoreError> {
    let tx = store.upgrade().ok_or(StoreError::Unavailable)?;
    let (reply, rx) = oneshot::channel();
    tx.send(StoreCmd::GetMessage { id, reply })
        .map_err(|_| StoreError::Unavailable)?;
    drop(tx);
    rx.blocking_recv().map_err(|_| StoreError::Unavailable)?
}
