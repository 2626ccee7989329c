//! Change subscription over LISTEN/NOTIFY.
//!
//! Each subscription owns a listener connection and a task. On every
//! notice, and on a poll tick in case a notice was lost, the task re-reads
//! both tables and publishes the difference to the last snapshot it sent.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::{CHANGES_CHANNEL, Db};
use crate::error::Result;
use crate::event::{Change, StoreEvent};
use crate::store::{EVENT_CHANNEL_CAPACITY, Snapshot, Subscription};

pub(super) async fn subscribe(pool: PgPool, poll_interval: Duration) -> Result<Subscription> {
    // Listen before the first read so no commit falls between the two.
    let mut listener = PgListener::connect_with(&pool).await?;
    listener.listen(CHANGES_CHANNEL).await?;

    let initial = Arc::new(Db::load_snapshot(&pool).await?);
    let (tx, rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(run(pool, listener, Arc::clone(&initial), tx, poll_interval));
    Ok(Subscription::new(initial, rx))
}

async fn run(
    pool: PgPool,
    mut listener: PgListener,
    mut last: Arc<Snapshot>,
    tx: broadcast::Sender<StoreEvent>,
    poll_interval: Duration,
) {
    let mut seq = 0;
    loop {
        tokio::select! {
            notif = listener.recv() => {
                match notif {
                    Ok(n) => debug!(payload = n.payload(), "change notice"),
                    Err(e) => warn!("PgListener error: {e}, falling back to poll"),
                }
            }
            _ = tokio::time::sleep(poll_interval) => {}
        }

        if tx.receiver_count() == 0 {
            debug!("subscription dropped, stopping listener");
            return;
        }

        let next = match Db::load_snapshot(&pool).await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                error!("snapshot reload failed: {e}");
                continue;
            }
        };
        let changes = Change::diff(&last, &next);
        if changes.is_empty() {
            continue;
        }

        seq += 1;
        let event = StoreEvent {
            seq,
            timestamp: Utc::now(),
            snapshot: Arc::clone(&next),
            changes,
        };
        if tx.send(event).is_err() {
            return;
        }
        last = next;
    }
}
