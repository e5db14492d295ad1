pub mod archive;
pub mod binning;
pub mod config;
pub mod error;
pub mod event;
pub mod event_log;
pub mod output;
pub mod stats;
