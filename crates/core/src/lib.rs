pub mod config;
pub mod kbd;
pub mod keymap;
pub mod memory;
pub mod tables;

#[cfg(any(test, feature = "fixture"))]
pub mod fixture;

pub use config::*;
pub use keymap::*;
pub use memory::*;
pub use tables::*;
