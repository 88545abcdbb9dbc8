//! Lock-free hand-off of compiled artifacts to the audio thread.
//!
//! The compile thread builds a new [`CompiledProgram`] entirely off to
//! the side, then [`ArtifactSlot::install`]s it: one atomic pointer
//! swap, observably atomic from the reader's side: a reader sees
//! either the old artifact or the new one, never anything partial.
//!
//! Reclamation point: `install` drops the old artifact only after the
//! active-reader count has been observed at zero following the swap,
//! i.e. after every audio callback that could have entered the old
//! code has returned. The wait is conservative (it also waits out
//! readers of the new artifact) but bounded by one callback duration,
//! and it runs on the compile thread; the reader side is two atomic
//! operations and never blocks.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::object::CompiledProgram;

#[derive(Default)]
pub struct ArtifactSlot {
    current: AtomicPtr<CompiledProgram>,
    active_readers: AtomicUsize,
    /// Serializes writers; readers never touch it.
    writer: Mutex<()>,
}

impl ArtifactSlot {
    pub fn new() -> Self {
        ArtifactSlot {
            current: AtomicPtr::new(ptr::null_mut()),
            active_readers: AtomicUsize::new(0),
            writer: Mutex::new(()),
        }
    }

    /// Audio-thread side: run `f` against the current artifact (or
    /// `None` before the first successful compile). Lock-free and
    /// allocation-free; the artifact cannot be freed while `f` runs.
    pub fn with<R>(&self, f: impl FnOnce(Option<&CompiledProgram>) -> R) -> R {
        self.active_readers.fetch_add(1, Ordering::Acquire);
        let ptr = self.current.load(Ordering::Acquire);
        // Safety: a non-null pointer was installed by `install` and is
        // not dropped until active_readers has been seen at zero after
        // it was unlinked; our increment happened first.
        let result = f(unsafe { ptr.as_ref() });
        self.active_readers.fetch_sub(1, Ordering::Release);
        result
    }

    /// Compile-thread side: publish a new artifact and reclaim the old
    /// one after readers have drained.
    pub fn install(&self, program: CompiledProgram) {
        let fresh = Box::into_raw(Box::new(program));
        let _writer = self.writer.lock();
        let old = self.current.swap(fresh, Ordering::AcqRel);
        self.drain_readers();
        if !old.is_null() {
            // Safety: unlinked above, and no reader that could have
            // loaded it is still active.
            drop(unsafe { Box::from_raw(old) });
        }
    }

    /// Remove the current artifact (e.g. on shutdown), reclaiming it
    /// after readers drain.
    pub fn clear(&self) {
        let _writer = self.writer.lock();
        let old = self.current.swap(ptr::null_mut(), Ordering::AcqRel);
        self.drain_readers();
        if !old.is_null() {
            // Safety: as in `install`.
            drop(unsafe { Box::from_raw(old) });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current.load(Ordering::Acquire).is_null()
    }

    fn drain_readers(&self) {
        // Audio callbacks are short; a bounded spin with yields is
        // cheaper than any notification scheme the reader would have
        // to pay for.
        while self.active_readers.load(Ordering::Acquire) != 0 {
            std::thread::yield_now();
        }
    }
}

impl Drop for ArtifactSlot {
    fn drop(&mut self) {
        let old = self.current.swap(ptr::null_mut(), Ordering::AcqRel);
        if !old.is_null() {
            // Safety: exclusive access in Drop; no readers can exist.
            drop(unsafe { Box::from_raw(old) });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_reads_none() {
        let slot = ArtifactSlot::new();
        assert!(slot.is_empty());
        let seen = slot.with(|p| p.is_some());
        assert!(!seen);
    }
}
