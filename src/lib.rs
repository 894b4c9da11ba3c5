//! Library crate for portprobe: a bounded-concurrency TCP connect port scanner.
pub mod collector;
pub mod config;
pub mod error;
pub mod export;
pub mod ports;
pub mod prober;
pub mod progress;
pub mod scanner;
pub mod services;
pub mod target;
pub mod types;
