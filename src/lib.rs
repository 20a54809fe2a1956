pub mod app;
pub mod audio;
pub mod config;
pub mod controller;
pub mod error;
pub mod library;
pub mod logging;
pub mod model;
pub mod presence;
pub mod progress;
pub mod thumbnail;
pub mod ui;
