use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerOwner {
    Sequencer,
    Overlay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    SequenceStep { step: usize },
    SequenceDone,
    OverlayTick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    pub due: Duration,
    pub owner: TimerOwner,
    /// Run token of the owner at scheduling time; a stale token means the run was cancelled.
    pub token: u64,
    pub kind: TimerKind,
}

/// Cooperative timer queue on a virtual clock.
///
/// Deadlines are offsets from an arbitrary origin. Nothing here sleeps: the
/// runtime loop (or a test) moves the clock with `pop_due` / `set_now`.
#[derive(Debug, Default)]
pub struct TimerQueue {
    now: Duration,
    next_seq: u64,
    pending: BTreeMap<(Duration, u64), Timer>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.now.as_millis()).unwrap_or(u64::MAX)
    }

    pub fn schedule(&mut self, owner: TimerOwner, token: u64, delay: Duration, kind: TimerKind) {
        let due = self.now + delay;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(
            (due, seq),
            Timer {
                due,
                owner,
                token,
                kind,
            },
        );
    }

    /// Drops every pending timer of `owner`. Returns how many were removed.
    pub fn cancel(&mut self, owner: TimerOwner) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, t| t.owner != owner);
        before - self.pending.len()
    }

    pub fn pending(&self, owner: TimerOwner) -> usize {
        self.pending.values().filter(|t| t.owner == owner).count()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.keys().next().map(|(due, _)| *due)
    }

    /// Removes the earliest timer due at or before `until`, moving the clock to its deadline.
    pub fn pop_due(&mut self, until: Duration) -> Option<Timer> {
        let key = *self.pending.keys().next()?;
        if key.0 > until {
            return None;
        }
        let timer = self.pending.remove(&key)?;
        self.now = self.now.max(timer.due);
        Some(timer)
    }

    /// Moves the clock forward. The clock never runs backwards.
    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_deadline_then_schedule_order() {
        let mut q = TimerQueue::new();
        q.schedule(TimerOwner::Overlay, 1, Duration::from_millis(100), TimerKind::OverlayTick);
        q.schedule(TimerOwner::Sequencer, 1, Duration::from_millis(50), TimerKind::SequenceDone);
        q.schedule(TimerOwner::Sequencer, 1, Duration::from_millis(100), TimerKind::SequenceStep { step: 1 });

        let until = Duration::from_millis(100);
        let order: Vec<TimerKind> = std::iter::from_fn(|| q.pop_due(until)).map(|t| t.kind).collect();
        assert_eq!(
            order,
            vec![
                TimerKind::SequenceDone,
                TimerKind::OverlayTick,
                TimerKind::SequenceStep { step: 1 }
            ]
        );
        assert_eq!(q.now(), until);
    }

    #[test]
    fn cancel_only_touches_owner() {
        let mut q = TimerQueue::new();
        q.schedule(TimerOwner::Overlay, 1, Duration::from_millis(10), TimerKind::OverlayTick);
        q.schedule(TimerOwner::Sequencer, 1, Duration::from_millis(10), TimerKind::SequenceDone);
        assert_eq!(q.cancel(TimerOwner::Overlay), 1);
        assert_eq!(q.pending(TimerOwner::Overlay), 0);
        assert_eq!(q.pending(TimerOwner::Sequencer), 1);
    }

    #[test]
    fn not_due_stays_queued_and_clock_is_monotonic() {
        let mut q = TimerQueue::new();
        q.set_now(Duration::from_millis(500));
        q.schedule(TimerOwner::Overlay, 1, Duration::from_millis(100), TimerKind::OverlayTick);
        assert!(q.pop_due(Duration::from_millis(599)).is_none());
        assert_eq!(q.next_deadline(), Some(Duration::from_millis(600)));
        q.set_now(Duration::from_millis(10));
        assert_eq!(q.now_ms(), 500);
    }
}
