use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::BsError;

/// Cooperative cancellation flag shared between a run and its controller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), BsError> {
        if self.is_cancelled() {
            return Err(BsError::Cancelled);
        }
        Ok(())
    }
}
