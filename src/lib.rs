pub mod cli;
pub mod dataset;
pub mod error;
pub mod fixcheck;
pub mod logger;
pub mod metadata;
pub mod relocate;
pub mod report;
pub mod runner;
pub mod summary;
pub mod targets;
