//! Logical client management

mod registry;

pub use registry::{ClientHandle, ClientRegistry};
