use std::{
  collections::VecDeque,
  time::{Duration, Instant},
};

/// One live session owned by the pool.
pub struct PoolEntry<S> {
  pub session: S,
  pub last_used: Instant,
}

impl<S> PoolEntry<S> {
  pub fn new(session: S) -> PoolEntry<S> {
    PoolEntry {
      session,
      last_used: Instant::now(),
    }
  }
}

/// What a caller should do after asking for a session.
pub enum Checkout<S> {
  /// Reuse this idle entry (probe it first).
  Idle(PoolEntry<S>),
  /// Under the cap: dial a new session. The slot is already
  /// counted; discard it if the dial fails.
  Dial,
  /// At the cap: wait for a release.
  Full,
}

/// FIFO queue of idle entries plus a counter of all live
/// (idle + leased) entries. Pure state, generic over the session
/// type; callers serialize access per host.
pub struct PoolState<S> {
  idle: VecDeque<PoolEntry<S>>,
  total: usize,
  max: usize,
}

impl<S> PoolState<S> {
  pub fn new(max: usize) -> PoolState<S> {
    PoolState {
      idle: VecDeque::new(),
      total: 0,
      max,
    }
  }

  pub fn total(&self) -> usize {
    self.total
  }

  pub fn idle_len(&self) -> usize {
    self.idle.len()
  }

  pub fn checkout(&mut self) -> Checkout<S> {
    if let Some(entry) = self.idle.pop_front() {
      return Checkout::Idle(entry);
    }
    if self.total < self.max {
      self.total += 1;
      Checkout::Dial
    } else {
      Checkout::Full
    }
  }

  /// Return a leased (or probed) entry to the idle queue.
  pub fn checkin(&mut self, mut entry: PoolEntry<S>) {
    entry.last_used = Instant::now();
    self.idle.push_back(entry);
  }

  /// Give up the slot of a destroyed entry.
  pub fn discard(&mut self) {
    self.total = self.total.saturating_sub(1);
  }

  /// Take one idle entry without giving up its slot, for
  /// out-of-lock health probing. Pair with checkin / discard.
  pub fn pop_idle(&mut self) -> Option<PoolEntry<S>> {
    self.idle.pop_front()
  }

  /// Remove idle entries older than `ttl`, giving up their slots.
  /// Returns them so the caller can close the sessions.
  pub fn evict_idle(
    &mut self,
    ttl: Duration,
    now: Instant,
  ) -> Vec<PoolEntry<S>> {
    let mut kept = VecDeque::with_capacity(self.idle.len());
    let mut evicted = Vec::new();
    while let Some(entry) = self.idle.pop_front() {
      if now.duration_since(entry.last_used) > ttl {
        evicted.push(entry);
      } else {
        kept.push_back(entry);
      }
    }
    self.idle = kept;
    self.total = self.total.saturating_sub(evicted.len());
    evicted
  }

  /// Remove every idle entry, giving up the slots.
  pub fn drain_idle(&mut self) -> Vec<PoolEntry<S>> {
    let drained: Vec<_> = self.idle.drain(..).collect();
    self.total = self.total.saturating_sub(drained.len());
    drained
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dials_up_to_cap_then_reports_full() {
    let mut state: PoolState<()> = PoolState::new(2);
    assert!(matches!(state.checkout(), Checkout::Dial));
    assert!(matches!(state.checkout(), Checkout::Dial));
    assert_eq!(state.total(), 2);
    // At the cap with nothing idle.
    assert!(matches!(state.checkout(), Checkout::Full));
    assert_eq!(state.total(), 2);
  }

  #[test]
  fn checkin_makes_entry_reusable_fifo() {
    let mut state: PoolState<u32> = PoolState::new(5);
    assert!(matches!(state.checkout(), Checkout::Dial));
    assert!(matches!(state.checkout(), Checkout::Dial));
    state.checkin(PoolEntry::new(1));
    state.checkin(PoolEntry::new(2));
    let Checkout::Idle(first) = state.checkout() else {
      panic!("expected idle entry");
    };
    assert_eq!(first.session, 1);
    assert_eq!(state.total(), 2);
  }

  #[test]
  fn discard_frees_a_slot() {
    let mut state: PoolState<()> = PoolState::new(1);
    assert!(matches!(state.checkout(), Checkout::Dial));
    assert!(matches!(state.checkout(), Checkout::Full));
    state.discard();
    assert!(matches!(state.checkout(), Checkout::Dial));
  }

  #[test]
  fn evicts_only_entries_past_ttl() {
    let mut state: PoolState<u32> = PoolState::new(5);
    assert!(matches!(state.checkout(), Checkout::Dial));
    assert!(matches!(state.checkout(), Checkout::Dial));
    state.checkin(PoolEntry::new(1));
    state.checkin(PoolEntry::new(2));

    let ttl = Duration::from_secs(300);
    let fresh = state.evict_idle(ttl, Instant::now());
    assert!(fresh.is_empty());
    assert_eq!(state.total(), 2);

    let later = Instant::now() + Duration::from_secs(400);
    let aged = state.evict_idle(ttl, later);
    assert_eq!(aged.len(), 2);
    assert_eq!(state.total(), 0);
    assert_eq!(state.idle_len(), 0);
  }

  #[test]
  fn drain_idle_empties_the_queue() {
    let mut state: PoolState<()> = PoolState::new(3);
    assert!(matches!(state.checkout(), Checkout::Dial));
    assert!(matches!(state.checkout(), Checkout::Dial));
    state.checkin(PoolEntry::new(()));
    state.checkin(PoolEntry::new(()));
    assert_eq!(state.drain_idle().len(), 2);
    assert_eq!(state.total(), 0);
    assert!(matches!(state.checkout(), Checkout::Dial));
  }
}
