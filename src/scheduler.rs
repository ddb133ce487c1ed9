//! Tick scheduling
//!
//! The host calls back once per display refresh with a [`Ticket`] it was
//! handed earlier. Only the most recently issued ticket is honoured, and none
//! after [`Scheduler::stop`], so a callback that fires after teardown is a
//! no-op.

/// Token for one scheduled tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

/// Skips ticks until `interval_ms` has passed since the last accepted one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameGate {
    interval_ms: Option<f64>,
    last_ms: f64,
}

impl FrameGate {
    pub fn new(interval_ms: Option<f64>) -> Self {
        Self {
            interval_ms,
            last_ms: 0.0,
        }
    }

    pub fn unthrottled() -> Self {
        Self::new(None)
    }

    /// True when a tick at host time `now_ms` should simulate and render.
    pub fn accept(&mut self, now_ms: f64) -> bool {
        match self.interval_ms {
            None => true,
            Some(interval) => {
                if now_ms - self.last_ms < interval {
                    false
                } else {
                    self.last_ms = now_ms;
                    true
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Simulate and render, then reschedule.
    Run,
    /// Gate closed: reschedule without work.
    Skip,
    /// Ticket superseded or scheduler stopped: do nothing.
    Stale,
}

#[derive(Debug)]
pub struct Scheduler {
    gate: FrameGate,
    pending: Option<u64>,
    next_id: u64,
    stopped: bool,
    accepted: u64,
    skipped: u64,
}

impl Scheduler {
    pub fn new(gate: FrameGate) -> Self {
        Self {
            gate,
            pending: None,
            next_id: 0,
            stopped: false,
            accepted: 0,
            skipped: 0,
        }
    }

    /// Issues the next ticket, replacing any outstanding one. `None` once stopped.
    pub fn schedule(&mut self) -> Option<Ticket> {
        if self.stopped {
            return None;
        }
        self.next_id += 1;
        self.pending = Some(self.next_id);
        Some(Ticket(self.next_id))
    }

    pub fn pending(&self) -> Option<Ticket> {
        self.pending.map(Ticket)
    }

    /// Consumes `ticket` and decides what the tick does.
    pub fn admit(&mut self, ticket: Ticket, now_ms: f64) -> Admission {
        if self.stopped || self.pending != Some(ticket.0) {
            return Admission::Stale;
        }
        self.pending = None;
        if self.gate.accept(now_ms) {
            self.accepted += 1;
            Admission::Run
        } else {
            self.skipped += 1;
            Admission::Skip
        }
    }

    /// Invalidates every outstanding ticket. Idempotent.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.pending = None;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}
