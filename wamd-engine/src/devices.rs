// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device discovery and caching.
//!
//! Maps user JIDs to the full list of device JIDs registered for the
//! account, resolving misses through a USync query. Results are cached per
//! user for a few minutes; message sends are frequent and device lists
//! change rarely.
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tracing::debug;

use wamd_core::{Jid, Node};

use crate::cache::TtlCache;
use crate::error::EngineError;
use crate::traits::Socket;

pub struct DeviceRegistry {
    cache: Mutex<TtlCache<String, Vec<Jid>>>,
}

impl DeviceRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(TtlCache::new(ttl)),
        }
    }

    /// Resolves all device JIDs for `contacts`.
    ///
    /// With `exclude_self` the query keeps only secondary devices (the
    /// callers' primary handles are appended verbatim instead) and our own
    /// device is always filtered out.
    pub async fn resolve<S: Socket>(
        &self,
        socket: &S,
        tag: String,
        own_device: &Jid,
        contacts: &[Jid],
        exclude_self: bool,
    ) -> Result<Vec<Jid>, EngineError> {
        let (cached, missing) = {
            let cache = self.cache.lock().map_err(|_| EngineError::LockPoisoned)?;
            let mut cached = Vec::new();
            let mut missing = Vec::new();
            for contact in contacts {
                match cache.get(&contact.user().to_string()) {
                    Some(devices) => cached.extend(devices.iter().cloned()),
                    None => missing.push(contact.clone()),
                }
            }
            (cached, missing)
        };

        if missing.is_empty() {
            debug!(contacts = contacts.len(), "device cache fully warm");
            return Ok(if exclude_self {
                concat(&[contacts, &cached])
            } else {
                cached
            });
        }

        let query = build_usync_query(&tag, &missing);
        let response = socket.send_query("get", "usync", query).await?;
        let discovered = parse_device_list(&response, own_device, exclude_self)?;
        debug!(
            queried = missing.len(),
            discovered = discovered.len(),
            "resolved devices via usync"
        );

        {
            let mut cache = self.cache.lock().map_err(|_| EngineError::LockPoisoned)?;
            let mut by_user: HashMap<String, Vec<Jid>> = HashMap::new();
            for device in &discovered {
                by_user
                    .entry(device.user().to_string())
                    .or_default()
                    .push(device.clone());
            }
            for (user, devices) in by_user {
                cache.insert(user, devices);
            }
        }

        Ok(if exclude_self {
            concat(&[contacts, &cached, &discovered])
        } else {
            concat(&[&cached, &discovered])
        })
    }
}

fn concat(parts: &[&[Jid]]) -> Vec<Jid> {
    parts.iter().flat_map(|part| part.iter().cloned()).collect()
}

/// `<usync>` query for the device lists of `contacts`.
fn build_usync_query(tag: &str, contacts: &[Jid]) -> Node {
    let users = contacts
        .iter()
        .map(|contact| Node::with_attributes("user", [("jid", contact)]))
        .collect();
    Node::with_children(
        "usync",
        vec![
            Node::with_children(
                "query",
                vec![Node::with_attributes("devices", [("version", 2)])],
            ),
            Node::with_children("list", users),
        ],
    )
    .attr("sid", tag)
    .attr("mode", "query")
    .attr("last", "true")
    .attr("index", 0)
    .attr("context", "message")
}

/// Walks a USync response, keeping the `<device-list>` entries that qualify:
/// tagged `device`, not our own device, secondary devices only when
/// `exclude_self` (primaries are re-added from the input), and carrying a
/// `key-index` whenever they are secondary.
fn parse_device_list(
    response: &Node,
    own_device: &Jid,
    exclude_self: bool,
) -> Result<Vec<Jid>, EngineError> {
    let mut devices = Vec::new();
    for child in response.children() {
        let Some(list) = child.find_child("list") else {
            continue;
        };
        for user in list.children_by_tag("user") {
            let jid = user.attributes().jid("jid")?;
            let device_list = user
                .required_child("devices")?
                .required_child("device-list")?;
            for entry in device_list.children() {
                if entry.tag() != "device" {
                    continue;
                }
                let device_id = entry.attributes().u64("id")? as u32;
                if exclude_self && device_id == 0 {
                    continue;
                }
                if jid.user() == own_device.user() && device_id == own_device.device_id() {
                    continue;
                }
                if device_id != 0 && !entry.attributes().contains("key-index") {
                    continue;
                }
                devices.push(Jid::device(jid.user(), device_id));
            }
        }
    }
    Ok(devices)
}
