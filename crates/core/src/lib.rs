pub mod config;
pub mod error;
pub mod revision;
pub mod status;

pub use config::{BuilderSpec, BuildersConfig, Config};
pub use error::*;
pub use revision::*;
pub use status::*;
