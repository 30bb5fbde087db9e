pub mod cli;
pub mod config;
pub mod counter;
pub mod dates;
pub mod error;
pub mod history;
pub mod import;
pub mod service;
pub mod store;
