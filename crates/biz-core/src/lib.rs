pub mod config;
pub mod logging;

pub mod fetch;
pub mod input;
pub mod package;
pub mod pipeline;
pub mod process;
pub mod shutdown;
pub mod staging;
pub mod transcode;
