//! CPU-side view of the GPU timeline
//!
//! Every queue submission gets the next generation number. A fence wait that
//! returns proves the submission it guarded has completed, and because a
//! fence signal covers all earlier work on the same queue, every generation
//! up to that one is retired as well.

/// Submission generations handed out and retired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GpuTimeline {
    submitted: u64,
    retired: u64,
}

impl GpuTimeline {
    /// Fresh timeline; nothing submitted, nothing retired
    pub const fn new() -> Self {
        Self {
            submitted: 0,
            retired: 0,
        }
    }

    /// Stamp the next submission
    pub fn next_submission(&mut self) -> u64 {
        self.submitted += 1;
        self.submitted
    }

    /// Record that `generation` completed on the GPU
    pub fn retire(&mut self, generation: u64) {
        debug_assert!(generation <= self.submitted, "retired a generation never submitted");
        self.retired = self.retired.max(generation);
    }

    /// Everything submitted so far has completed (device idle)
    pub fn retire_all(&mut self) {
        self.retired = self.submitted;
    }

    /// Latest generation handed to the queue
    pub const fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Highest generation known complete
    pub const fn retired(&self) -> u64 {
        self.retired
    }

    /// Generation a resource released now must wait for: the frame that is
    /// about to be (or is being) recorded may still reference it
    pub const fn release_generation(&self) -> u64 {
        self.submitted + 1
    }

    /// Submissions not yet known complete
    pub const fn in_flight(&self) -> u64 {
        self.submitted - self.retired
    }
}
