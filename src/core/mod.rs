pub mod codec;
pub mod host;
pub mod matrix;
pub mod registry;

// Convenience re-exports for library users
pub use host::HostArray;
pub use matrix::Matrix;
pub use registry::{Handle, HandleRegistry};
