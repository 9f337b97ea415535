// src/library.rs

//! Process-wide bus library state.
//!
//! Opening the library is reference counted: every publish call opens it,
//! closes it when done, and any number of calls may overlap. There is no
//! global teardown, so a closed library is always ready to be opened again.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::{ErrorCode, PublishError, Result, Step};

/// Highest compatibility version this crate implements.
pub const COMPATIBILITY_VERSION: u32 = 2;

static OPEN_HANDLES: AtomicUsize = AtomicUsize::new(0);
static TOTAL_OPENS: AtomicU64 = AtomicU64::new(0);

/// An open reference to the bus library.
///
/// Dropping the handle closes it.
#[derive(Debug)]
pub struct Library {
    version: u32,
}

impl Library {
    /// Open the library at the current compatibility version.
    pub fn open() -> Result<Self> {
        Self::open_with_version(COMPATIBILITY_VERSION)
    }

    /// Open the library, requesting a specific compatibility version.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorCode::VersionMismatch`] when `version` is zero or
    /// newer than [`COMPATIBILITY_VERSION`].
    pub fn open_with_version(version: u32) -> Result<Self> {
        // ---
        if version == 0 || version > COMPATIBILITY_VERSION {
            return Err(PublishError::bus(
                Step::OpenLibrary,
                ErrorCode::VersionMismatch,
                format!(
                    "requested compatibility version {version}, supported 1..={COMPATIBILITY_VERSION}"
                ),
            ));
        }

        OPEN_HANDLES.fetch_add(1, Ordering::SeqCst);
        TOTAL_OPENS.fetch_add(1, Ordering::Relaxed);
        Ok(Self { version })
    }

    /// Compatibility version this handle was opened with.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Close this handle.
    pub fn close(self) {
        drop(self);
    }

    /// Number of handles currently open in this process.
    pub fn open_handles() -> usize {
        OPEN_HANDLES.load(Ordering::SeqCst)
    }

    /// Number of successful opens since process start.
    pub fn total_opens() -> u64 {
        TOTAL_OPENS.load(Ordering::Relaxed)
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        OPEN_HANDLES.fetch_sub(1, Ordering::SeqCst);
    }
}
