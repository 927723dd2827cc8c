pub mod config;
pub mod errors;
pub mod guide_providers;
pub mod models;
pub mod services;
pub mod utils;
pub mod xmltv;
