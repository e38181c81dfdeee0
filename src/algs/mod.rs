//! Re-export public algorithms.

pub mod communicator;
pub mod gather;
pub mod scatter;
pub mod wire;

pub use gather::{Gather, gather_fixed, gather_variable};
pub use scatter::{
    Scatter, scatter_fixed, scatter_fixed_bytes, scatter_variable, scatter_variable_bytes,
};
