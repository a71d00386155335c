// SPDX-License-Identifier: MIT OR Apache-2.0

//! Group metadata cache.
use std::sync::Mutex;
use std::time::Duration;

use wamd_core::chat::GroupMetadata;
use wamd_core::Jid;

use crate::cache::TtlCache;
use crate::error::EngineError;
use crate::traits::Socket;

pub struct GroupRegistry {
    cache: Mutex<TtlCache<Jid, GroupMetadata>>,
}

impl GroupRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(TtlCache::new(ttl)),
        }
    }

    /// Group metadata, from cache or via a metadata query.
    pub async fn resolve<S: Socket>(
        &self,
        socket: &S,
        jid: &Jid,
    ) -> Result<GroupMetadata, EngineError> {
        if let Some(metadata) = self
            .cache
            .lock()
            .map_err(|_| EngineError::LockPoisoned)?
            .get(jid)
        {
            return Ok(metadata.clone());
        }

        let metadata = socket.query_group_metadata(jid).await?;
        self.cache
            .lock()
            .map_err(|_| EngineError::LockPoisoned)?
            .insert(jid.clone(), metadata.clone());
        Ok(metadata)
    }
}
