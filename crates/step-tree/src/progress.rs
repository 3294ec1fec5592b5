//! Progress notifications.
//!
//! Progress is pushed as [`ProgressEvent`]s over an unbounded
//! `crossbeam-channel`. Sending never blocks and never drops an event
//! while the receiver is alive, so every phase's `Complete` arrives after
//! its ticks. Once the receiver is gone, events are discarded.

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Pipeline stage a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Decoding and resolving product definitions.
    Products,
    /// Decoding assembly relations.
    Relations,
    /// Building the structure tree.
    Build,
}

/// One progress notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Work item `count` of `phase` done. Counts start at 1 and only increase.
    Tick {
        /// The phase.
        phase: Phase,
        /// Items processed so far in this phase.
        count: u64,
    },
    /// `phase` finished. Sent exactly once per phase run.
    Complete {
        /// The phase.
        phase: Phase,
    },
}

/// Optional progress sink handed to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    sender: Option<Sender<ProgressEvent>>,
}

impl Progress {
    /// A sink that discards everything.
    pub fn none() -> Self {
        Self::default()
    }

    /// Create a sink together with the receiving end of an unbounded channel.
    pub fn channel() -> (Self, Receiver<ProgressEvent>) {
        let (tx, rx) = unbounded();
        (Self { sender: Some(tx) }, rx)
    }

    /// Start counting a phase.
    pub fn phase(&self, phase: Phase) -> PhaseCounter<'_> {
        PhaseCounter {
            progress: self,
            phase,
            count: 0,
        }
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.sender {
            // Only fails once the receiver is dropped
            let _ = tx.send(event);
        }
    }
}

/// Accumulator for one phase, threaded through the work it measures.
#[derive(Debug)]
pub struct PhaseCounter<'a> {
    progress: &'a Progress,
    phase: Phase,
    count: u64,
}

impl PhaseCounter<'_> {
    /// Record one more work item.
    pub fn tick(&mut self) {
        self.count += 1;
        self.progress.send(ProgressEvent::Tick {
            phase: self.phase,
            count: self.count,
        });
    }

    /// Items recorded so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Finish the phase.
    pub fn complete(self) -> u64 {
        self.progress.send(ProgressEvent::Complete { phase: self.phase });
        self.count
    }
}
