pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod patterns;
pub mod platform;
pub mod report;
pub mod triage;
