//! The fixed ring of prefetch slots.
//!
//! Every slot owns pre-allocated imagery and label buffers plus a `ready`
//! bit, all behind one mutex. `ready == true` means a reader filled the
//! buffers and nobody consumed them yet; `ready == false` means they are
//! writable. Nothing touches a slot without holding its mutex, and every
//! acquisition is a try-lock: a busy slot is skipped, never waited on, so a
//! stalled consumer cannot back up the readers and a slow reader cannot
//! stall the consumer.

use std::sync::{Mutex, MutexGuard};

/// Buffers and readiness bit of one slot. Access only through
/// [`Slot::try_claim`].
pub(crate) struct SlotPayload {
    pub ready: bool,
    pub imagery: Vec<u8>,
    /// Empty when the run has no label raster.
    pub label: Vec<u8>,
}

pub(crate) struct Slot {
    payload: Mutex<SlotPayload>,
}

impl Slot {
    fn new(imagery_len: usize, label_len: usize) -> Self {
        Self {
            payload: Mutex::new(SlotPayload {
                ready: false,
                imagery: vec![0; imagery_len],
                label: vec![0; label_len],
            }),
        }
    }

    /// Non-blocking claim. `None` means the slot is held by someone else;
    /// the caller moves on to another slot. A poisoned mutex also reads
    /// as busy.
    pub fn try_claim(&self) -> Option<MutexGuard<'_, SlotPayload>> {
        self.payload.try_lock().ok()
    }
}

/// The M-entry slot ring. All buffers are allocated here, up front; the hot
/// paths only ever copy into and out of them.
pub(crate) struct SlotPool {
    slots: Vec<Slot>,
}

impl SlotPool {
    pub fn new(num_slots: usize, imagery_len: usize, label_len: usize) -> Self {
        let slots = (0..num_slots)
            .map(|_| Slot::new(imagery_len, label_len))
            .collect();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, index: usize) -> &Slot {
        &self.slots[index]
    }
}
