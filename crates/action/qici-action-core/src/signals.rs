//! Signals emitted while playing.
//!
//! Actions and managers never call back into the host. They push `Signal`s
//! into a bounded outbox which the host drains with `take_signals()` after
//! each tick. A manager forwards the signals of the timelines it drives, so
//! draining the top-level manager sees everything.

use serde::{Deserialize, Serialize};

use crate::ids::{NodeId, TransitionId};

/// Discrete playback signals. `timeline` is the uuid of the emitter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Signal {
    Started {
        timeline: String,
    },
    /// Non-looping action reached its duration.
    Finished {
        timeline: String,
    },
    /// Looping action wrapped around.
    LoopFinished {
        timeline: String,
    },
    /// A timeline event called a script function. `trigger` holds the
    /// key of a truthy return value.
    EventFired {
        timeline: String,
        func: String,
        time: f64,
        trigger: Option<String>,
    },
    TransitionTaken {
        manager: String,
        transition: TransitionId,
        from: NodeId,
        to: NodeId,
    },
    ManagerFinished {
        manager: String,
    },
}

/// Bounded signal queue.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Outbox {
    items: Vec<Signal>,
    capacity: usize,
    dropped: usize,
}

impl Outbox {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity,
            dropped: 0,
        }
    }

    /// Queue a signal. Once full, further signals are dropped (and counted).
    pub fn push(&mut self, signal: Signal) {
        if self.items.len() >= self.capacity {
            if self.dropped == 0 {
                log::warn!("signal outbox full ({}), dropping", self.capacity);
            }
            self.dropped += 1;
            return;
        }
        self.items.push(signal);
    }

    pub fn extend(&mut self, signals: impl IntoIterator<Item = Signal>) {
        for s in signals {
            self.push(s);
        }
    }

    pub fn take(&mut self) -> Vec<Signal> {
        self.dropped = 0;
        std::mem::take(&mut self.items)
    }

    /// Signals dropped since the last `take()`.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.dropped = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_past_capacity() {
        let mut out = Outbox::with_capacity(2);
        for i in 0..5 {
            out.push(Signal::Started {
                timeline: i.to_string(),
            });
        }
        assert_eq!(out.len(), 2);
        assert_eq!(out.dropped(), 3);
        let taken = out.take();
        assert_eq!(taken.len(), 2);
        assert!(out.is_empty());
        assert_eq!(out.dropped(), 0);
    }
}
