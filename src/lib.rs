#[macro_use]
extern crate log;

pub mod config;
pub mod error;
pub mod xmlrpc;

pub use crate::config::ClientConfig;
pub use crate::error::{Error, Result};
pub use crate::xmlrpc::Client;
