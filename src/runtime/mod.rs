//! Application lifecycle: engine startup and graceful shutdown.

pub mod lifetime;
