pub mod config;
pub mod counter;
pub mod error;
pub mod logger;
pub mod model;
pub mod server;
pub mod widget;
