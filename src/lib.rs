pub mod apis;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod transform;
pub mod types;
