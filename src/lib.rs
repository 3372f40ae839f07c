pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod mail;
pub mod output;
pub mod pipeline;

pub use error::{Error, Result};
