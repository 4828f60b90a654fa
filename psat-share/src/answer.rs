//! The shared answer slots and the process-level async-stop flag (§5).
//!
//! "The answer array uses sequentially consistent stores and loads (or equivalent); a worker
//! observing any non-Undef entry stops its current segment." We use `Ordering::SeqCst`
//! literally, matching that wording rather than relaxing it to the weaker ordering the access
//! pattern would technically allow.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// One worker's contribution to the shared answer array: `Undef` until that worker concludes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Answer {
    Undef,
    Sat,
    Unsat,
}

impl Answer {
    fn to_u8(self) -> u8 {
        match self {
            Answer::Undef => 0,
            Answer::Sat => 1,
            Answer::Unsat => 2,
        }
    }

    fn from_u8(value: u8) -> Answer {
        match value {
            1 => Answer::Sat,
            2 => Answer::Unsat,
            _ => Answer::Undef,
        }
    }
}

/// The global answer board shared by every worker, plus the cooperative stop flag.
pub struct AnswerBoard {
    slots: Vec<AtomicU8>,
    stop: AtomicBool,
}

impl AnswerBoard {
    pub fn new(n: usize) -> AnswerBoard {
        AnswerBoard {
            slots: (0..n).map(|_| AtomicU8::new(Answer::Undef.to_u8())).collect(),
            stop: AtomicBool::new(false),
        }
    }

    /// Record worker `id`'s answer. Once any worker's answer is non-`Undef`, [`AnswerBoard::any_decided`]
    /// becomes true for every observer and [`AnswerBoard::request_stop`] is implied.
    pub fn set(&self, id: usize, answer: Answer) {
        self.slots[id].store(answer.to_u8(), Ordering::SeqCst);
        if answer != Answer::Undef {
            self.stop.store(true, Ordering::SeqCst);
        }
    }

    pub fn get(&self, id: usize) -> Answer {
        Answer::from_u8(self.slots[id].load(Ordering::SeqCst))
    }

    /// The first non-`Undef` answer found, in worker-id order, if any.
    pub fn any_decided(&self) -> Option<(usize, Answer)> {
        (0..self.slots.len())
            .map(|id| (id, self.get(id)))
            .find(|&(_, answer)| answer != Answer::Undef)
    }

    /// Whether the fleet has an answer (equivalently: whether `async_stop` is set).
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Set by a signal handler or resource-limit check (§5's `async_interrupt`); cooperative,
    /// observed at the next segment boundary.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observing_any_answer_stops_everyone() {
        let board = AnswerBoard::new(3);
        assert!(!board.should_stop());
        board.set(1, Answer::Unsat);
        assert!(board.should_stop());
        assert_eq!(board.any_decided(), Some((1, Answer::Unsat)));
    }

    #[test]
    fn external_stop_request() {
        let board = AnswerBoard::new(2);
        board.request_stop();
        assert!(board.should_stop());
        assert_eq!(board.any_decided(), None);
    }
}
