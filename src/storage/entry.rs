//! Stored entry of one client.

/// Algorithm state of one client plus the bookkeeping the store needs.
#[derive(Debug)]
pub(crate) struct StoreEntry<S> {
    /// Algorithm-owned state.
    pub state: S,
    /// Latest clock reading at which the entry was used.
    pub last_access: u64,
    /// Set under the entry lock when the entry leaves the map. A caller that
    /// locks an evicted entry must look the key up again.
    pub evicted: bool,
}

impl<S> StoreEntry<S> {
    pub fn new(state: S, now: u64) -> Self {
        Self {
            state,
            last_access: now,
            evicted: false,
        }
    }

    /// Record a use at `now`. A clock reading older than the last use does
    /// not make the entry look idle for longer.
    pub fn touch(&mut self, now: u64) {
        self.last_access = self.last_access.max(now);
    }

    pub fn idle_for(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_access)
    }
}
