/// Opaque-handle registry: maps process-unique numeric handles to owned
/// instances.
///
/// The host cannot hold native references, so every live instance is parked
/// here and addressed by a `Handle` — a plain integer the host can round-trip
/// through its numeric arrays. Handles are issued from a monotonically
/// increasing counter and never reused within a process, so a stale handle
/// can always be detected instead of silently aliasing a newer instance.
///
/// The registry is explicit process-scoped state: it starts empty, is owned
/// by whoever drives the bridge (no hidden singleton), and drops all
/// remaining instances when it is dropped. Calls are serialized by the host's
/// single-threaded invocation model; a multi-threaded host must wrap the
/// registry in its own mutual exclusion.
use std::collections::HashMap;
use std::fmt;

// ── Handle ────────────────────────────────────────────────────────────────

/// Opaque token referencing one live instance.
///
/// The raw value stays far below 2^53, so it survives a round trip through
/// the host's double-precision arrays without loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Reconstruct a handle from a host-side scalar.
    ///
    /// Returns `None` for values that cannot be a handle at all (non-finite,
    /// non-integral, or outside 1..2^53). A well-formed value may still refer
    /// to a destroyed instance; `resolve` decides that.
    pub fn from_scalar(v: f64) -> Option<Handle> {
        const MAX_EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
        if !v.is_finite() || v.fract() != 0.0 || v < 1.0 || v > MAX_EXACT {
            return None;
        }
        Some(Handle(v as u64))
    }

    pub fn as_scalar(self) -> f64 {
        self.0 as f64
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Registry ──────────────────────────────────────────────────────────────

pub struct HandleRegistry<T> {
    instances: HashMap<u64, T>,
    next: u64,
}

impl<T> HandleRegistry<T> {
    /// An empty registry. Handle numbering starts at 1 so that 0 can never
    /// be mistaken for a valid handle by a host that zero-initializes.
    pub fn new() -> Self {
        Self {
            instances: HashMap::new(),
            next: 1,
        }
    }

    /// Take ownership of a new instance and issue a fresh handle for it.
    /// The counter only moves forward; destroyed handle values are retired
    /// forever.
    pub fn create(&mut self, instance: T) -> Handle {
        let handle = Handle(self.next);
        self.next += 1;
        self.instances.insert(handle.0, instance);
        handle
    }

    /// Borrow the instance behind a handle. `None` if the handle was never
    /// issued or has been destroyed.
    pub fn resolve(&mut self, handle: Handle) -> Option<&mut T> {
        self.instances.get_mut(&handle.0)
    }

    /// Destroy the instance behind a handle, dropping it exactly once.
    /// Returns `false` if the handle is unknown or already destroyed — the
    /// caller reports that as a use-after-free, never a silent no-op.
    pub fn destroy(&mut self, handle: Handle) -> bool {
        self.instances.remove(&handle.0).is_some()
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
