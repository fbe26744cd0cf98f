pub mod browser;
pub mod common;
pub mod config;
pub mod datetime;
pub mod domain;
pub mod engine;
pub mod extract;
pub mod logging;
pub mod normalize;
pub mod output;
pub mod settings;
pub mod transform;
pub mod validate;
pub mod workflow;

pub use common::error::{Result, ScraperError};
pub use engine::ScraperEngine;
