//! # qcbridge
//!
//! Host-bridge layer for quantum-chemistry sessions: exposes a stateful
//! engine instance (molecule + basis set + derived matrices) to a calling
//! environment that only understands command strings, numeric handles, and
//! column-major arrays.
//!
//! The bridge solves three problems: representing long-lived native objects
//! as opaque numeric handles, converting between column-major (host) and
//! row-major (engine) dense-matrix layouts, and validating/routing ~37
//! string commands with the right index-convention shifts.
//!
//! ## Quick Start
//!
//! ```rust
//! use qcbridge::bridge::{Bridge, Request};
//! use qcbridge::core::Handle;
//!
//! let mut bridge = Bridge::with_model_engine();
//!
//! // Construct a session: molecule specification + basis-set name
//! let reply = bridge
//!     .call(&Request::new("new").arg_str("H 0 0 0\nH 0 0 1.4").arg_str("sto-3g"))
//!     .unwrap();
//! let handle = Handle::from_scalar(reply.outputs[0].scalar_value().unwrap()).unwrap();
//!
//! // Query through the command protocol
//! let natom = bridge.call(&Request::new("natom").with_handle(handle)).unwrap();
//! assert_eq!(natom.outputs[0].scalar_value(), Some(2.0));
//!
//! // Destroy; the handle is dead afterwards
//! bridge.call(&Request::new("delete").with_handle(handle)).unwrap();
//! assert!(bridge.call(&Request::new("natom").with_handle(handle)).is_err());
//! ```

pub mod bridge;
pub mod core;
pub mod engine;
