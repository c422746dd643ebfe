//! Identity registry test double

mod registry;

pub use crate::registry::{GENESIS_TIME, MemoryRegistry};
