pub mod registry;
pub mod unit;

pub use registry::WorkRegistry;
pub use unit::{share_target, WorkUnit};
