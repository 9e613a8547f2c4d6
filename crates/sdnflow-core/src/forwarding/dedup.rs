//! Broadcast dedup table.
//!
//! Flooding over a graph that still has loops (e.g. right after a link came
//! up and before the tree caught up) can deliver the same broadcast to a
//! switch twice, through different ports. The first port wins; later copies
//! through other ports are dropped.

use lru::LruCache;
use sdnflow_types::{DatapathId, MacAddress, PortNo};
use std::net::Ipv4Addr;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

/// Identity of one broadcast resolution request as seen by one switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub dpid: DatapathId,
    pub src: MacAddress,
    /// Address being resolved.
    pub target: Ipv4Addr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupVerdict {
    /// No live entry; this port is now recorded.
    First,
    /// Another copy on the port recorded first.
    SamePort,
    /// Copy arriving on a different port than the first one.
    Duplicate { first_port: PortNo },
}

#[derive(Debug, Clone, Copy)]
struct FirstSighting {
    port: PortNo,
    seen_at: Instant,
}

/// Bounded dedup table: entries live for `ttl` after their first sighting
/// and the least recently touched entry is evicted past `capacity`.
#[derive(Debug)]
pub struct BroadcastDedup {
    entries: LruCache<DedupKey, FirstSighting>,
    ttl: Duration,
}

impl BroadcastDedup {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    /// Records or checks a broadcast sighting at `now`.
    ///
    /// An expired entry is treated as absent. Repeated sightings do not
    /// extend an entry's lifetime.
    pub fn observe(&mut self, key: DedupKey, port: PortNo, now: Instant) -> DedupVerdict {
        if let Some(first) = self.entries.get(&key) {
            if now.saturating_duration_since(first.seen_at) < self.ttl {
                return if first.port == port {
                    DedupVerdict::SamePort
                } else {
                    DedupVerdict::Duplicate {
                        first_port: first.port,
                    }
                };
            }
        }
        self.entries.put(key, FirstSighting { port, seen_at: now });
        DedupVerdict::First
    }

    /// Drops every entry recorded by `dpid`.
    pub fn purge_switch(&mut self, dpid: DatapathId) -> usize {
        let stale: Vec<DedupKey> = self
            .entries
            .iter()
            .filter(|(key, _)| key.dpid == dpid)
            .map(|(key, _)| *key)
            .collect();
        for key in &stale {
            self.entries.pop(key);
        }
        stale.len()
    }

    /// Drops entries older than the TTL.
    pub fn expire(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let stale: Vec<DedupKey> = self
            .entries
            .iter()
            .filter(|(_, first)| now.saturating_duration_since(first.seen_at) >= ttl)
            .map(|(key, _)| *key)
            .collect();
        for key in &stale {
            self.entries.pop(key);
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
