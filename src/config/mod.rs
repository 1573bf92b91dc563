//! Static configuration: `config.toml`, `SHORTENER__*` environment variables
//! and built-in defaults.

mod r#impl;
mod structs;

pub use r#impl::{get_config, init_config_with};
pub use structs::*;
