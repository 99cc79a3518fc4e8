pub mod api;
pub mod args;
pub mod capture;
pub mod commands;
mod config;
pub mod controller;
mod error;
pub mod export;
pub mod model;
pub mod review;
pub mod settings;
mod utils;

#[cfg(test)]
mod test;

pub use api::Mode;
pub use config::Config;
pub use error::{Error, ErrorType, Result};
