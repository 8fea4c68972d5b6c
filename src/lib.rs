pub mod config;
pub mod display;
pub mod error;
pub mod history;
pub mod logging;
pub mod lottery;
pub mod requests;
pub mod roster;
pub mod service;
pub mod web;

pub use error::{LotteryError, Result};
