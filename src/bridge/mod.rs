/// Command dispatch between the host environment and engine instances.
///
/// The host speaks a minimal protocol: a command name string, optionally a
/// numeric instance handle, and positional arguments that are strings,
/// scalars, or column-major arrays. This module resolves the command against
/// a static table, validates arity and shape, translates index conventions,
/// routes to the engine, and converts every result back to host layout.
///
/// All failure modes are values of `BridgeError`; nothing unwinds across the
/// dispatch boundary, so one bad call can never take the host process down.
pub mod command;
pub mod convention;
pub mod dispatcher;

use std::fmt;

pub use command::Command;
pub use dispatcher::{Bridge, Reply, Request, Value};

// ── Error taxonomy ────────────────────────────────────────────────────────

/// Every way a dispatch can fail, each carrying the failing command name.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// The command token matched nothing in the table.
    UnknownCommand { command: String },
    /// Wrong arity, wrong argument type, or an out-of-range index, caught
    /// before the engine is invoked.
    Argument { command: String, msg: String },
    /// The handle was never issued or its instance is already destroyed.
    InvalidHandle { command: String, handle: u64 },
    /// A dimension mismatch discovered during layout conversion.
    Shape { command: String, msg: String },
    /// The delegated computation itself failed.
    Engine { command: String, msg: String },
}

impl BridgeError {
    /// The command the failure belongs to.
    pub fn command(&self) -> &str {
        match self {
            BridgeError::UnknownCommand { command }
            | BridgeError::Argument { command, .. }
            | BridgeError::InvalidHandle { command, .. }
            | BridgeError::Shape { command, .. }
            | BridgeError::Engine { command, .. } => command,
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::UnknownCommand { command } => {
                write!(f, "unknown command '{command}'")
            }
            BridgeError::Argument { command, msg } => {
                write!(f, "{command}: argument error: {msg}")
            }
            BridgeError::InvalidHandle { command, handle } => {
                write!(
                    f,
                    "{command}: invalid handle #{handle} (never issued or already destroyed)"
                )
            }
            BridgeError::Shape { command, msg } => {
                write!(f, "{command}: shape error: {msg}")
            }
            BridgeError::Engine { command, msg } => {
                write!(f, "{command}: engine failure: {msg}")
            }
        }
    }
}

impl std::error::Error for BridgeError {}

// ── Tests ─────────────────────────────────────────────────────────────────
