// Shared error slot
// First error wins; later reports are dropped. Workers poll it to drain and
// exit early, the distributor polls it per record, and each stage join
// propagates it as the single fatal outcome.

use anyhow::Error;
use std::sync::Mutex;

#[derive(Default)]
pub struct ErrorSlot {
    slot: Mutex<Option<Error>>,
}

impl ErrorSlot {
    pub fn new() -> ErrorSlot {
        ErrorSlot::default()
    }

    /// Record an error unless one is already set.
    pub fn report(&self, err: Error) {
        let mut slot = self.slot.lock().unwrap();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    pub fn is_set(&self) -> bool {
        self.slot.lock().unwrap().is_some()
    }

    /// Move the error out, if any. Called once after the stage join.
    pub fn take(&self) -> Option<Error> {
        self.slot.lock().unwrap().take()
    }
}
