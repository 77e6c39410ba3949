pub mod bpm;
pub mod cli;
pub mod config;
pub mod runtime;
