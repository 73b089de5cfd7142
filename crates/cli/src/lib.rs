pub mod args;
pub mod commands;
pub mod config;

pub use commands::{plan_for, Plan};
