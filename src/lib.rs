pub mod analytics;
pub mod api;
pub mod config;
pub mod fetch;
pub mod process;
pub mod registry;
pub mod roster;
