// src/commands/mod.rs
//! Command handlers for the apkpack CLI

mod emit;
mod inspect;
mod keygen;

pub use emit::cmd_emit;
pub use inspect::{cmd_inspect, cmd_verify};
pub use keygen::cmd_keygen;
