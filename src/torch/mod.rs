//! Torch components
pub mod distributions;
pub mod modules;
pub mod optimizers;
pub mod policies;
pub mod utils;

pub use modules::{Activation, MlpConfig};
pub use optimizers::{BuildOptimizer, ConstrainedOptimizer, Optimizer};
pub use policies::{BuildPolicy, Policy};
