/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Config file defaults
pub const DEFAULT_CONFIG_FILE: &str = "guide-providers.toml";
pub const ENV_PREFIX: &str = "GUIDE_PROVIDERS_";

// HTTP defaults
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_USER_AGENT: &str = concat!("guide-providers/", env!("CARGO_PKG_VERSION"));

// Output defaults
pub const DEFAULT_OUTPUT_PATH: &str = "guide.xml";
pub const DEFAULT_GENERATOR_NAME: &str = "guide-providers";
