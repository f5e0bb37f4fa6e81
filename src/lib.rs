pub mod cli;
pub mod audio;
pub mod config;
pub mod coordination;
pub mod error;
pub mod host;
pub mod logging;
pub mod monitor;


pub use error::*;
