// src/core/claim.rs
use crate::error::ClaimConflict;
use std::sync::atomic::{AtomicBool, Ordering};

/// Single-assignment right to submit the session's one sell order.
///
/// `try_claim` is a compare-and-set: of any number of concurrent callers,
/// exactly one sees `Ok`. The flag is never reset.
#[derive(Debug, Default)]
pub struct SaleClaim {
    claimed: AtomicBool,
}

impl SaleClaim {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_claim(&self) -> Result<(), ClaimConflict> {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| ClaimConflict)
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}
