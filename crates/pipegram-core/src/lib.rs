pub mod error;
pub mod config;
pub mod session;
pub mod remote;
pub mod media;
pub mod service;
pub mod util;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
