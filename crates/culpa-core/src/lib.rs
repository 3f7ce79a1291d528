pub mod collection;
pub mod config;
pub mod error;
pub mod event;
pub mod report;
pub mod runner;
pub mod secrets;
pub mod sink;
pub mod source;
