//! Retry/timeout tracking for data requests.
//!
//! Every requester of a hash holds its own record, but only one request per
//! hash is on the wire: the oldest unresolved record sends, later ones wait
//! and take over if it goes away. Replies are correlated to records by hash
//! alone, so a reply from a peer other than the one asked still resolves
//! them, and one reply resolves every record waiting on that hash.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use gossip_core::ContentHash;
use gossip_store::SharedFile;

use crate::error::{Result, SyncError};
use crate::messages::{DataRequest, GossipPacket};
use crate::transport::{send_packet, Transport};

/// A request awaiting its reply.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Hash whose bytes were requested.
    pub hash: ContentHash,
    /// Peer the request was addressed to.
    pub target: String,
    /// File the bytes belong to.
    pub file: SharedFile,
    /// Chunk index of the bytes; 0 for the metafile.
    pub chunk_index: u64,
    /// Set once a verified reply was correlated.
    pub received: bool,
    /// Token of the download this request belongs to. Follow-up chunk
    /// requests inherit it.
    pub cancel: CancellationToken,
}

struct Waiter {
    ticket: u64,
    request: PendingRequest,
    resolved: Arc<Notify>,
}

/// Tracks outstanding requests per hash and drives resends.
pub struct TimeoutTracker {
    slots: Mutex<HashMap<ContentHash, Vec<Waiter>>>,
    next_ticket: AtomicU64,
    resend_interval: Duration,
}

impl TimeoutTracker {
    pub fn new(resend_interval: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(0),
            resend_interval,
        }
    }

    pub fn resend_interval(&self) -> Duration {
        self.resend_interval
    }

    /// Create a record for `hash` before its send loop starts.
    ///
    /// If the hash is already pending for another file, the new record joins
    /// it: no second request goes out while the first one is unresolved. The
    /// record lives until the returned [`Registration`] is dropped.
    pub fn register(
        &self,
        hash: ContentHash,
        target: &str,
        file: SharedFile,
        chunk_index: u64,
        cancel: CancellationToken,
    ) -> Registration<'_> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let resolved = Arc::new(Notify::new());
        let waiter = Waiter {
            ticket,
            request: PendingRequest {
                hash,
                target: target.to_string(),
                file,
                chunk_index,
                received: false,
                cancel: cancel.clone(),
            },
            resolved: Arc::clone(&resolved),
        };

        let joined = self.with_slots(|s| {
            let waiters = s.entry(hash).or_default();
            let joined = waiters.iter().any(|w| !w.request.received);
            waiters.push(waiter);
            joined
        });
        if joined {
            tracing::debug!(
                %hash,
                chunk = chunk_index,
                "waiting on in-flight request for the same hash"
            );
        }

        Registration {
            tracker: self,
            hash,
            ticket,
            resolved,
            cancel,
        }
    }

    /// Resolve every unresolved record for `hash` and wake their loops.
    ///
    /// Each record is returned the first time only. Stale replies (no record)
    /// and duplicate replies (all resolved) yield an empty list.
    pub fn mark_received(&self, hash: &ContentHash, origin: &str) -> Vec<PendingRequest> {
        self.with_slots(|slots| {
            let Some(waiters) = slots.get_mut(hash) else {
                return Vec::new();
            };
            waiters
                .iter_mut()
                .filter(|w| !w.request.received)
                .map(|w| {
                    if w.request.target != origin {
                        tracing::debug!(
                            %hash,
                            expected = %w.request.target,
                            origin,
                            "reply from unexpected peer accepted"
                        );
                    }
                    w.request.received = true;
                    w.resolved.notify_one();
                    w.request.clone()
                })
                .collect()
        })
    }

    /// True if some record for `hash` has had its reply.
    pub fn is_received(&self, hash: &ContentHash) -> bool {
        self.with_slots(|s| {
            s.get(hash)
                .is_some_and(|waiters| waiters.iter().any(|w| w.request.received))
        })
    }

    /// True if any record exists for `hash`.
    pub fn is_pending(&self, hash: &ContentHash) -> bool {
        self.with_slots(|s| s.contains_key(hash))
    }

    /// Number of registered records.
    pub fn pending_count(&self) -> usize {
        self.with_slots(|s| s.values().map(Vec::len).sum())
    }

    fn unregister(&self, hash: &ContentHash, ticket: u64) {
        self.with_slots(|s| {
            if let Some(waiters) = s.get_mut(hash) {
                waiters.retain(|w| w.ticket != ticket);
                if waiters.is_empty() {
                    s.remove(hash);
                }
            }
        });
    }

    fn is_resolved(&self, hash: &ContentHash, ticket: u64) -> bool {
        self.with_slots(|s| {
            s.get(hash)
                .and_then(|waiters| waiters.iter().find(|w| w.ticket == ticket))
                .is_some_and(|w| w.request.received)
        })
    }

    /// The oldest unresolved record of a hash is the one that sends.
    fn is_sender(&self, hash: &ContentHash, ticket: u64) -> bool {
        self.with_slots(|s| {
            s.get(hash)
                .and_then(|waiters| waiters.iter().find(|w| !w.request.received))
                .is_some_and(|w| w.ticket == ticket)
        })
    }

    fn with_slots<R>(&self, f: impl FnOnce(&mut HashMap<ContentHash, Vec<Waiter>>) -> R) -> R {
        f(&mut self.slots.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// A registered record. Dropping it removes the record.
pub struct Registration<'a> {
    tracker: &'a TimeoutTracker,
    hash: ContentHash,
    ticket: u64,
    resolved: Arc<Notify>,
    cancel: CancellationToken,
}

impl Registration<'_> {
    /// Send `request` to `addr` until its reply is recorded.
    ///
    /// There is no retry cap: the loop resends every resend interval until a
    /// correlated reply resolves the record or the record's token fires. While
    /// an older record for the same hash is unresolved this loop only waits.
    /// A send failure ends the loop with that error.
    pub async fn send(
        &self,
        transport: &dyn Transport,
        request: &DataRequest,
        addr: SocketAddr,
    ) -> Result<()> {
        let packet = GossipPacket::DataRequest(request.clone());

        let mut attempt: u64 = 0;
        loop {
            if self.tracker.is_sender(&self.hash, self.ticket) {
                attempt += 1;
                if attempt > 1 {
                    tracing::debug!(hash = %self.hash, %addr, attempt, "resending data request");
                }
                send_packet(transport, &packet, addr).await?;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(SyncError::Cancelled),
                _ = self.resolved.notified() => {}
                _ = tokio::time::sleep(self.tracker.resend_interval) => {}
            }

            if self.tracker.is_resolved(&self.hash, self.ticket) {
                return Ok(());
            }
        }
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.tracker.unregister(&self.hash, self.ticket);
    }
}
