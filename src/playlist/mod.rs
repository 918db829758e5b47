pub mod candidates;
pub mod config;
pub mod filters;
pub mod generator;
pub mod metadata;
pub mod pruning;
pub mod ranking;
pub mod scoring;
pub mod source;
pub mod utils;


pub use config::*;
pub use generator::*;
pub use metadata::*;
pub use source::MediaSource;
