//! Presence and heartbeat tracking with lazy session reaping.
//!
//! Clients ping periodically; a heartbeat that arrives after a long gap
//! is treated as a reconnect and replays the disconnect/connect hooks
//! for the sender. Every heartbeat also sweeps all known sessions and
//! reaps the stale ones. There is no background task: if nobody ever
//! pings again, a dead session lingers until the next heartbeat from
//! anyone. Embedders with a scheduler can call [`Presence::reap_stale`]
//! periodically for more timely cleanup.

use std::sync::Arc;

use diffsync_store::{Key, Store, UserId};

use crate::clock::Clock;
use crate::colors::ColorAllocator;
use crate::registry::Registry;

/// Heartbeats older than this many seconds mark a session as dead.
/// Clients must ping at most every half of this, or the server will
/// spuriously classify them as reconnecting.
pub const MAX_HEARTBEAT_INTERVAL: u64 = 5;

pub(crate) fn heartbeat_of(store: &Store, user: &UserId) -> Option<u64> {
    let bytes = store.get(&Key::Heartbeat { user: user.clone() })?;
    std::str::from_utf8(&bytes).ok()?.parse().ok()
}

pub(crate) fn all_heartbeats(store: &Store) -> Vec<(UserId, u64)> {
    store
        .scan(|k| matches!(k, Key::Heartbeat { .. }))
        .into_iter()
        .filter_map(|k| {
            let user = k.user()?.clone();
            let stamp = heartbeat_of(store, &user)?;
            Some((user, stamp))
        })
        .collect()
}

pub struct Presence {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    registry: Registry,
    colors: ColorAllocator,
}

impl Presence {
    pub fn new(
        store: Arc<Store>,
        clock: Arc<dyn Clock>,
        registry: Registry,
        colors: ColorAllocator,
    ) -> Self {
        Self {
            store,
            clock,
            registry,
            colors,
        }
    }

    /// Records a heartbeat for `user`, firing the connect hook when the
    /// sender is new or returning after a gap beyond 1.5x the maximum
    /// interval, then opportunistically reaps every stale session.
    pub fn heartbeat(&self, user: &UserId) {
        let now = self.clock.now_secs();
        let prior = heartbeat_of(&self.store, user);
        let newly_connected = prior
            .map_or(true, |t| now.saturating_sub(t) > MAX_HEARTBEAT_INTERVAL * 3 / 2);

        // A stale heartbeat record means the sender was the last one out
        // of a previous session; clear their residual state first.
        if newly_connected && prior.is_some() {
            self.disconnect(user);
        }

        self.store.put(
            Key::Heartbeat { user: user.clone() },
            now.to_string().into_bytes(),
        );

        if newly_connected {
            self.connect(user);
        }

        self.reap_stale(now);
    }

    /// Tears down every session whose heartbeat age exceeds
    /// [`MAX_HEARTBEAT_INTERVAL`]: registrations, heartbeat record, and
    /// the disconnect hook (which releases the color).
    pub fn reap_stale(&self, now: u64) {
        for (user, stamp) in all_heartbeats(&self.store) {
            if now.saturating_sub(stamp) > MAX_HEARTBEAT_INTERVAL {
                log::info!("reaping stale collaborator {user}");
                self.registry.unregister_all(&user);
                self.store.delete(&Key::Heartbeat { user: user.clone() });
                self.disconnect(&user);
            }
        }
    }

    pub fn is_live(&self, user: &UserId) -> bool {
        heartbeat_of(&self.store, user).is_some_and(|t| {
            self.clock.now_secs().saturating_sub(t) <= MAX_HEARTBEAT_INTERVAL
        })
    }

    // Lifecycle hooks. Both must stay idempotent: reaping may disconnect
    // a user who immediately reconnects through their own heartbeat.
    fn connect(&self, user: &UserId) {
        log::debug!("collaborator connected: {user}");
    }

    fn disconnect(&self, user: &UserId) {
        log::debug!("collaborator disconnected: {user}");
        self.colors.release(user);
    }
}
