use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

static PROCESS_SLOT: OnceLock<RecordingSlot> = OnceLock::new();
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Exclusive claim on capture, shared by every session that must not
/// acquire or record at the same time as another.
///
/// Sessions use [`RecordingSlot::process`] unless built with their own slot.
/// A claim is held from the start of an attempt until the session leaves
/// the acquiring, recording, and finalizing states.
#[derive(Clone, Default)]
pub struct RecordingSlot {
    holder: Arc<Mutex<Option<u64>>>,
}

impl RecordingSlot {
    /// A fresh slot, independent of the process-wide one.
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot shared by every session in this process.
    pub fn process() -> Self {
        PROCESS_SLOT.get_or_init(Self::new).clone()
    }

    /// Id of the session currently holding the slot.
    pub fn holder(&self) -> Option<u64> {
        *self.holder.lock()
    }

    pub fn is_free(&self) -> bool {
        self.holder().is_none()
    }

    /// Claim for `session`. Re-claiming by the holder succeeds.
    pub(crate) fn try_claim(&self, session: u64) -> bool {
        let mut holder = self.holder.lock();
        match *holder {
            Some(current) => current == session,
            None => {
                *holder = Some(session);
                true
            }
        }
    }

    /// Give the slot back if `session` holds it.
    pub(crate) fn release(&self, session: u64) {
        let mut holder = self.holder.lock();
        if *holder == Some(session) {
            *holder = None;
        }
    }
}

pub(crate) fn next_session_id() -> u64 {
    NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_holder_at_a_time() {
        let slot = RecordingSlot::new();

        assert!(slot.try_claim(1));
        assert!(slot.try_claim(1));
        assert!(!slot.try_claim(2));
        assert_eq!(slot.holder(), Some(1));

        slot.release(2);
        assert_eq!(slot.holder(), Some(1));
        slot.release(1);
        assert!(slot.is_free());
        assert!(slot.try_claim(2));
    }

    #[test]
    fn clones_share_the_claim() {
        let slot = RecordingSlot::new();
        let other = slot.clone();

        assert!(slot.try_claim(7));
        assert!(!other.try_claim(8));
        assert!(RecordingSlot::new().try_claim(8));
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(next_session_id(), next_session_id());
    }
}
