pub mod annotate;
pub mod camera;
pub mod config;
pub mod convert;
pub mod detect;
pub mod encode;
pub mod error;
pub mod io;
pub mod log;
pub mod manager;

pub use error::{CctvError, Result};
