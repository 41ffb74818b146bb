//! Local identifier allocation.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

use crate::error::{ReconcileError, Result};

/// Allocates local identifiers.
///
/// A remote-issued identity is always used verbatim. Synthetic identifiers
/// (unix milliseconds) are only handed out to read-only lookups, and never
/// twice from the same allocator.
#[derive(Debug, Default)]
pub struct IdentityAllocator {
    last_synthetic: AtomicI64,
}

impl IdentityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self, remote_identity: Option<&str>, read_only: bool) -> Result<String> {
        match remote_identity.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => Ok(id.to_string()),
            None if read_only => Ok(self.synthetic()),
            None => Err(ReconcileError::malformed(
                "remote response carried no identity",
            )),
        }
    }

    fn synthetic(&self) -> String {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last_synthetic.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self.last_synthetic.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next.to_string(),
                Err(current) => last = current,
            }
        }
    }
}
