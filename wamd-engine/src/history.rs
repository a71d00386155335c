// SPDX-License-Identifier: MIT OR Apache-2.0

//! History buffer: signals when a chat's recent-message batch went quiet.
//!
//! Every history-sync conversation is (re-)inserted here; each insertion
//! restarts a short TTL. Once a chat expires without having been re-inserted
//! its batch is considered complete and `on_chat_recent_messages(chat, true)`
//! fires. Only genuine expiry triggers the signal — manual removal is
//! invisible.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use wamd_core::chat::Chat;
use wamd_core::Jid;

use crate::cache::TtlCache;
use crate::traits::Events;

pub struct HistoryCache {
    entries: Arc<Mutex<TtlCache<Jid, Chat>>>,
    sweeper: JoinHandle<()>,
}

impl HistoryCache {
    /// Creates the buffer and spawns its sweeper task. Must be called from
    /// within a tokio runtime.
    pub fn new<E: Events + 'static>(ttl: Duration, sweep_period: Duration, events: Arc<E>) -> Self {
        let entries: Arc<Mutex<TtlCache<Jid, Chat>>> = Arc::new(Mutex::new(TtlCache::new(ttl)));
        let sweeper = tokio::spawn(sweep_loop(entries.clone(), sweep_period, events));
        Self { entries, sweeper }
    }

    /// Buffers a chat, restarting its TTL.
    pub fn insert(&self, chat: Chat) {
        match self.entries.lock() {
            Ok(mut entries) => entries.insert(chat.jid().clone(), chat),
            Err(_) => warn!("history cache lock poisoned; dropping entry"),
        }
    }
}

impl Drop for HistoryCache {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

async fn sweep_loop<E: Events>(
    entries: Arc<Mutex<TtlCache<Jid, Chat>>>,
    period: Duration,
    events: Arc<E>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let expired = match entries.lock() {
            Ok(mut entries) => entries.take_expired(),
            Err(_) => {
                warn!("history cache lock poisoned; sweeper exiting");
                return;
            }
        };
        for (_, chat) in expired {
            events.on_chat_recent_messages(&chat, true);
        }
    }
}
