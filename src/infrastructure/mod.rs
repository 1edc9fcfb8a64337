//! Infrastructure layer: snapshot files, result files, configuration, and
//! the live rate service.

pub mod config;
pub mod persistence;
pub mod rates_client;

pub use config::*;
pub use persistence::*;
pub use rates_client::*;
