//! Shared observation cell for the engine's output
//!
//! Several independent consumers (renderer, audio mapper, timing display)
//! need to see one authoritative phase/output stream without duplicating the
//! simulation. The engine's owner is the single writer; readers hold cheap
//! cloneable handles that load lock-free snapshots. There is deliberately no
//! global instance: ownership and lifecycle stay explicit.

use crate::engine::LfoSample;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Writer half. Owned alongside the engine by whoever drives the update
/// loop; publish once per tick, after `update()`.
pub struct LfoCell {
    inner: Arc<ArcSwap<LfoSample>>,
}

/// Read-only handle onto an [`LfoCell`]. Clone freely.
#[derive(Clone)]
pub struct LfoHandle {
    inner: Arc<ArcSwap<LfoSample>>,
}

impl LfoCell {
    pub fn new(initial: LfoSample) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    /// Publish the latest sample. Readers see either the old or the new
    /// snapshot, never a torn one.
    pub fn publish(&self, sample: LfoSample) {
        self.inner.store(Arc::new(sample));
    }

    pub fn handle(&self) -> LfoHandle {
        LfoHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl LfoHandle {
    /// Latest published sample.
    pub fn load(&self) -> LfoSample {
        **self.inner.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(phase: f64) -> LfoSample {
        LfoSample {
            phase,
            output: phase * 2.0,
            level: phase,
        }
    }

    #[test]
    fn test_handles_see_published_snapshots() {
        let cell = LfoCell::new(sample(0.0));
        let handle = cell.handle();
        assert_eq!(handle.load().phase, 0.0);

        cell.publish(sample(0.5));
        assert_eq!(handle.load().phase, 0.5);

        // Multiple handles observe the same stream
        let other = cell.handle();
        assert_eq!(other.load().phase, 0.5);
    }

    #[test]
    fn test_handle_outlives_reads_across_threads() {
        let cell = LfoCell::new(sample(0.1));
        let handle = cell.handle();
        let reader = std::thread::spawn(move || handle.load().phase);
        cell.publish(sample(0.9));
        let seen = reader.join().expect("reader thread panicked");
        assert!(seen == 0.1 || seen == 0.9, "reader saw a torn value: {}", seen);
    }
}
