//! Bounded single-producer/single-consumer ring buffers for the unit-literal and learnt-clause
//! traffic between one ordered pair of workers (§4.9).
//!
//! Head is owned by the consumer, tail by the producer; both only ever move forward modulo
//! `capacity`. A ring that is full when pushed to drops the new message rather than blocking
//! the producer — "rings drop on full instead of blocking," per §4.9's ordering guarantee. This
//! is the one place the source's raw `Lit***`/semaphore-guarded arrays get replaced with owned,
//! value-typed slots per §9: a clause ring slot owns its `Vec<Lit>` outright, so deallocation
//! rides the ring's own lifetime instead of a process-wide retired-pointer list.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use psat_formula::Lit;

/// A learnt, non-unit clause in flight between two workers.
#[derive(Debug, Clone)]
pub struct ClauseMsg {
    pub literals: Vec<Lit>,
    pub lbd: usize,
}

/// Ring buffer of unit literals (clauses of size 1, always exported at decision level 0).
pub struct UnitRing {
    capacity: usize,
    slots: Vec<AtomicUsize>,
    head: AtomicUsize,
    tail: AtomicUsize,
}

impl UnitRing {
    pub fn new(capacity: usize) -> UnitRing {
        assert!(capacity > 0, "ring capacity must be at least 1");
        UnitRing {
            capacity,
            slots: (0..capacity).map(|_| AtomicUsize::new(0)).collect(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Producer side. Returns whether the literal was actually queued (`false` means the ring
    /// was full and the literal was dropped).
    pub fn push(&self, lit: Lit) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Relaxed);
        let next = (tail + 1) % self.capacity;
        if next == head {
            return false;
        }
        self.slots[tail].store(lit.code(), Ordering::Relaxed);
        self.tail.store(next, Ordering::Release);
        true
    }

    /// Consumer side. Drains everything currently available into `into`, in production order.
    pub fn drain_into(&self, into: &mut Vec<Lit>) {
        let tail = self.tail.load(Ordering::Acquire);
        let mut head = self.head.load(Ordering::Relaxed);
        while head != tail {
            into.push(Lit::from_code(self.slots[head].load(Ordering::Relaxed)));
            head = (head + 1) % self.capacity;
        }
        self.head.store(head, Ordering::Release);
    }
}

/// Ring buffer of non-unit learnt clauses, with their LBD carried alongside.
pub struct ClauseRing {
    capacity: usize,
    slots: Vec<Mutex<Option<ClauseMsg>>>,
    head: AtomicUsize,
    tail: AtomicUsize,
}

impl ClauseRing {
    pub fn new(capacity: usize) -> ClauseRing {
        assert!(capacity > 0, "ring capacity must be at least 1");
        ClauseRing {
            capacity,
            slots: (0..capacity).map(|_| Mutex::new(None)).collect(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Producer side. Returns whether `msg` was actually queued.
    pub fn push(&self, msg: ClauseMsg) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Relaxed);
        let next = (tail + 1) % self.capacity;
        if next == head {
            return false;
        }
        *self.slots[tail].lock().unwrap() = Some(msg);
        self.tail.store(next, Ordering::Release);
        true
    }

    /// Consumer side. Drains everything currently available into `into`, in production order.
    pub fn drain_into(&self, into: &mut Vec<ClauseMsg>) {
        let tail = self.tail.load(Ordering::Acquire);
        let mut head = self.head.load(Ordering::Relaxed);
        while head != tail {
            if let Some(msg) = self.slots[head].lock().unwrap().take() {
                into.push(msg);
            }
            head = (head + 1) % self.capacity;
        }
        self.head.store(head, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psat_formula::lit;

    #[test]
    fn unit_ring_round_trips_in_order() {
        let ring = UnitRing::new(4);
        assert!(ring.push(lit!(1)));
        assert!(ring.push(lit!(-2)));
        let mut out = vec![];
        ring.drain_into(&mut out);
        assert_eq!(out, vec![lit!(1), lit!(-2)]);

        let mut out2 = vec![];
        ring.drain_into(&mut out2);
        assert!(out2.is_empty());
    }

    #[test]
    fn capacity_one_drops_every_push() {
        let ring = UnitRing::new(1);
        assert!(!ring.push(lit!(1)));
        let mut out = vec![];
        ring.drain_into(&mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn full_ring_drops_rather_than_blocks() {
        let ring = UnitRing::new(3);
        assert!(ring.push(lit!(1)));
        assert!(ring.push(lit!(2)));
        assert!(!ring.push(lit!(3)));

        let mut out = vec![];
        ring.drain_into(&mut out);
        assert_eq!(out, vec![lit!(1), lit!(2)]);
    }

    #[test]
    fn clause_ring_round_trips() {
        let ring = ClauseRing::new(4);
        assert!(ring.push(ClauseMsg {
            literals: vec![lit!(1), lit!(2), lit!(-3)],
            lbd: 2,
        }));
        let mut out = vec![];
        ring.drain_into(&mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].literals, vec![lit!(1), lit!(2), lit!(-3)]);
        assert_eq!(out[0].lbd, 2);
    }
}
