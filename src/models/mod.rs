//! Canonical guide data model
//!
//! Providers produce [`Channel`] values; downstream code converts them to the
//! XMLTV exchange schema and never mutates them.

pub mod channel;
pub mod configuration;

pub use channel::{Channel, Logo};
pub use configuration::Configuration;
