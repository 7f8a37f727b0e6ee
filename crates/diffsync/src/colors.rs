//! Display color allocation for collaborator avatars.
//!
//! Each live user gets one palette entry, picked lazily on first query
//! and released by the disconnect hook. Once all eight entries are held
//! by live users, everyone else shares the fallback color.

use std::sync::Arc;
use std::time::Duration;

use diffsync_store::{Key, Store, UserId};

use crate::clock::Clock;
use crate::error::CollabError;
use crate::presence::{all_heartbeats, MAX_HEARTBEAT_INTERVAL};

pub const PALETTE: [&str; 8] = [
    "#0000FF", "#FF0000", "#00FF00", "#FF00FF", "#0F00F0", "#F0000F", "#0F0F0F", "#F0F0F0",
];

pub const FALLBACK_COLOR: &str = "#FFFFFF";

const PICK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct ColorAllocator {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
}

impl ColorAllocator {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Returns the user's recorded color, allocating one when absent:
    /// the first palette entry not held by any user with a live
    /// heartbeat, or the fallback once the palette is exhausted.
    pub fn color_for(&self, user: &UserId) -> Result<String, CollabError> {
        let key = Key::Color { user: user.clone() };
        if let Some(color) = self.stored(&key) {
            return Ok(color);
        }

        let _guard = self.store.lock(&key, PICK_TIMEOUT)?;
        // Another caller may have picked while we waited.
        if let Some(color) = self.stored(&key) {
            return Ok(color);
        }

        let now = self.clock.now_secs();
        let taken: Vec<String> = all_heartbeats(&self.store)
            .into_iter()
            .filter(|(_, stamp)| now.saturating_sub(*stamp) <= MAX_HEARTBEAT_INTERVAL)
            .filter_map(|(other, _)| self.stored(&Key::Color { user: other }))
            .collect();

        let color = PALETTE
            .iter()
            .find(|c| !taken.iter().any(|t| t == *c))
            .copied()
            .unwrap_or(FALLBACK_COLOR);

        self.store.put(key.clone(), color.as_bytes().to_vec());
        Ok(color.to_string())
    }

    /// Drops the stored color so it can be reassigned.
    pub fn release(&self, user: &UserId) {
        self.store.delete(&Key::Color { user: user.clone() });
    }

    fn stored(&self, key: &Key) -> Option<String> {
        self.store
            .get(key)
            .map(|b| String::from_utf8_lossy(&b).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn user(name: &str) -> UserId {
        UserId::new(name).unwrap()
    }

    fn setup() -> (Arc<Store>, Arc<ManualClock>, ColorAllocator) {
        let store = Store::new();
        let clock = Arc::new(ManualClock::new(100));
        let colors = ColorAllocator::new(Arc::clone(&store), clock.clone());
        (store, clock, colors)
    }

    fn beat(store: &Store, user: &UserId, at: u64) {
        store.put(
            Key::Heartbeat { user: user.clone() },
            at.to_string().into_bytes(),
        );
    }

    #[test]
    fn allocation_is_stable_per_user() {
        let (_store, _clock, colors) = setup();
        let alice = user("alice");
        let first = colors.color_for(&alice).unwrap();
        assert_eq!(colors.color_for(&alice).unwrap(), first);
    }

    #[test]
    fn live_users_get_distinct_colors_until_palette_runs_out() {
        let (store, _clock, colors) = setup();
        let mut seen = Vec::new();
        for i in 0..PALETTE.len() {
            let u = user(&format!("user{i}"));
            beat(&store, &u, 100);
            let color = colors.color_for(&u).unwrap();
            assert!(!seen.contains(&color), "duplicate color {color}");
            seen.push(color);
        }

        let extra = user("extra");
        beat(&store, &extra, 100);
        assert_eq!(colors.color_for(&extra).unwrap(), FALLBACK_COLOR);
    }

    #[test]
    fn dead_user_colors_are_reassignable() {
        let (store, clock, colors) = setup();
        let alice = user("alice");
        beat(&store, &alice, 100);
        let taken = colors.color_for(&alice).unwrap();

        // Alice goes stale; her color record is still present but her
        // heartbeat no longer counts as live, so the entry is free.
        clock.set(100 + MAX_HEARTBEAT_INTERVAL + 1);
        let bob = user("bob");
        beat(&store, &bob, clock.now_secs());
        assert_eq!(colors.color_for(&bob).unwrap(), taken);
    }

    #[test]
    fn release_makes_color_available_again() {
        let (store, _clock, colors) = setup();
        let alice = user("alice");
        beat(&store, &alice, 100);
        let first = colors.color_for(&alice).unwrap();
        colors.release(&alice);
        let bob = user("bob");
        beat(&store, &bob, 100);
        assert_eq!(colors.color_for(&bob).unwrap(), first);
    }
}
