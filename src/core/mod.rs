pub mod builder;
pub mod config;
pub mod context;
pub mod diff;
pub mod geo;
pub mod map;
pub mod scheduler;
