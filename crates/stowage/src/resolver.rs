//! Collision-free name selection

use std::num::NonZeroU32;

use tracing::debug;

use crate::backend::StorageBackend;
use crate::error::{Result, StorageError};
use crate::path::{safe_join, split_name};

/// Picks a name that is free on a backend.
///
/// `report.pdf` is tried first, then `report_1.pdf`, `report_2.pdf` and so
/// on. Every candidate goes through [`safe_join`] again, so containment is
/// checked on each iteration.
///
/// # Concurrency
///
/// Resolution is a check followed later by a write, and nothing locks the
/// backend namespace in between. Two concurrent saves can both see the same
/// name as free; the backend's write semantics decide what happens next
/// (the filesystem backend lets the last writer win).
#[derive(Debug, Clone, Copy, Default)]
pub struct NameResolver {
    max_attempts: Option<NonZeroU32>,
}

impl NameResolver {
    /// Keep counting until a free name turns up
    pub fn unbounded() -> Self {
        Self { max_attempts: None }
    }

    /// Give up with `Conflict` after `attempts` numbered candidates.
    /// Zero means unbounded.
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: NonZeroU32::new(attempts),
        }
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts.map(NonZeroU32::get)
    }

    /// Return `name` if it is free, otherwise the first free numbered variant
    pub async fn resolve(&self, backend: &dyn StorageBackend, name: &str) -> Result<String> {
        let (dir, stem, ext) = split_name(name);
        let mut candidate = name.to_string();
        let mut counter: u32 = 1;

        while backend.exists(&candidate).await? {
            if let Some(max) = self.max_attempts {
                if counter > max.get() {
                    return Err(StorageError::conflict(format!(
                        "no free name for '{}' after {} attempts",
                        name, max
                    )));
                }
            }
            debug!("Name {} is taken, trying the next one", candidate);
            candidate = safe_join(dir, &[format!("{}_{}{}", stem, counter, ext)])?;
            counter += 1;
        }

        Ok(candidate)
    }
}
