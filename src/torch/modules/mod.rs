//! Torch modules
mod mlp;

pub use mlp::{Activation, Mlp, MlpConfig};
