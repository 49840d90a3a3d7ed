//! Backend selection module.
//!
//! This module defines the available computation backends for the engine
//! and provides functions to set and get the current backend.
//!
//! # Supported Backends
//!
//! - `Cpu` — rayon worker pool, one task per output row or tile band (default).
//! - `Wgpu` — WGSL compute shaders through `wgpu`, when built with the `wgpu`
//!   feature. Without the feature the CPU kernels run instead.
//!
//! The backend is stored globally using an `AtomicU8`, enabling fast
//! switching between CPU and GPU modes at runtime.

use core::sync::atomic::{AtomicU8, Ordering};
use tracing::{debug, warn};

/// Enumeration of supported computation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Backend {
    /// Pure CPU-based backend (default).
    #[default]
    Cpu = 0,
    /// GPU-accelerated backend using `wgpu`.
    Wgpu = 1,
}

impl Backend {
    /// Whether this build can actually run the backend.
    pub const fn is_available(self) -> bool {
        match self {
            Self::Cpu => true,
            Self::Wgpu => cfg!(feature = "wgpu"),
        }
    }
}

impl TryFrom<u8> for Backend {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Cpu),
            1 => Ok(Self::Wgpu),
            _ => Err(()),
        }
    }
}

/// Internal global state for the active backend.
///
/// This uses acquire/release ordering; the backend is expected to change
/// rarely and never in the middle of an engine call.
static GLOBAL_DEFAULT_BACKEND: AtomicU8 = AtomicU8::new(Backend::Cpu as u8);

/// Sets the active backend to use for matrix computation.
///
/// # Example
///
/// ```
/// use nnet::backend::{get_backend, set_backend, Backend};
/// set_backend(Backend::Cpu);
/// assert_eq!(get_backend(), Backend::Cpu);
/// ```
pub fn set_backend(b: Backend) {
    if !b.is_available() {
        warn!(backend = ?b, "backend not compiled in; engine calls will run on the CPU");
    } else {
        debug!(backend = ?b, "backend selected");
    }
    GLOBAL_DEFAULT_BACKEND.store(b as u8, Ordering::Release);
}

/// Returns the currently active computation backend.
///
/// If the stored value is invalid, defaults to [`Backend::Cpu`].
pub fn get_backend() -> Backend {
    Backend::try_from(GLOBAL_DEFAULT_BACKEND.load(Ordering::Acquire)).unwrap_or_default()
}

/// The backend engine calls will actually run on.
pub(crate) fn effective_backend() -> Backend {
    match get_backend() {
        b if b.is_available() => b,
        _ => Backend::Cpu,
    }
}
