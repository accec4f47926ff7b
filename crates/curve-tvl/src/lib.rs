pub mod config;
pub mod domain;
pub mod infra;
pub mod pipeline;

mod cli;
mod run;

pub use run::start;
