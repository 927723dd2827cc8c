//! Integration tests for provider resolution and the exchange schema
//!
//! Everything here goes through the public API only and performs no network
//! I/O: resolving a provider never contacts its backend.

use guide_providers::errors::AppError;
use guide_providers::models::{Channel, Configuration, Logo};
use rstest::rstest;

fn sd_config(provider: &str) -> Configuration {
    Configuration {
        provider: provider.to_string(),
        username: "u".to_string(),
        password: "p".to_string(),
        lineups: vec!["USA-OTA".to_string()],
        ..Default::default()
    }
}

#[test]
fn test_sd_configuration_resolves_to_credentialed_backend() {
    let provider = sd_config("sd").get_provider().unwrap();

    assert_eq!(provider.name(), "Schedules Direct (u)");
    assert_eq!(provider.configuration().lineups, vec!["USA-OTA".to_string()]);
    assert_eq!(provider.configuration(), sd_config("sd"));
}

#[rstest]
#[case("schedulesdirect")]
#[case("Schedules-Direct")]
#[case("SD")]
fn test_sd_aliases_resolve_alike(#[case] alias: &str) {
    let provider = sd_config(alias).get_provider().unwrap();
    assert_eq!(provider.name(), "Schedules Direct (u)");
}

#[test]
fn test_empty_provider_resolves_to_xmltv_backend() {
    let config = Configuration {
        xmltv_url: "http://example.com/guide.xml".to_string(),
        ..Default::default()
    };

    let provider = config.get_provider().unwrap();
    assert_eq!(provider.name(), "XMLTV (example.com)");
    assert_eq!(
        provider.configuration().xmltv_url,
        "http://example.com/guide.xml"
    );
}

#[test]
fn test_unrecognized_provider_falls_back_to_xmltv() {
    let config = Configuration {
        name: "typo".to_string(),
        provider: "schedules direct".to_string(),
        xmltv_url: "https://example.com/guide.xml.gz".to_string(),
        ..Default::default()
    };

    let provider = config.get_provider().unwrap();
    assert_eq!(provider.name(), "typo");
    assert_eq!(provider.configuration().provider, "schedules direct");
}

#[rstest]
#[case(Configuration { provider: "sd".to_string(), ..Default::default() })]
#[case(Configuration { provider: "sd".to_string(), username: "u".to_string(), ..Default::default() })]
#[case(Configuration { provider: "sd".to_string(), username: "u".to_string(), password: "p".to_string(), ..Default::default() })]
#[case(Configuration::default())]
#[case(Configuration { provider: "xmltv".to_string(), xmltv_url: "guide.xml".to_string(), ..Default::default() })]
fn test_missing_settings_are_configuration_errors(#[case] config: Configuration) {
    match config.get_provider() {
        Err(AppError::Configuration { .. }) => {}
        Err(other) => panic!("expected a configuration error, got {other}"),
        Ok(provider) => panic!("expected no provider, got '{}'", provider.name()),
    }
}

#[test]
fn test_channel_without_call_sign_or_logos() {
    let channel = Channel {
        name: "ESPN".to_string(),
        number: "206".to_string(),
        ..Default::default()
    };

    let converted = channel.to_xmltv();
    let names: Vec<&str> = converted
        .display_names
        .iter()
        .map(|d| d.value.as_str())
        .collect();
    assert_eq!(names, vec!["ESPN", "", "206"]);
    assert!(converted.icons.is_empty());
}

#[test]
fn test_channel_logos_become_icons_in_order() {
    let channel = Channel {
        id: "kabc".to_string(),
        name: "KABC".to_string(),
        logos: vec![
            Logo {
                url: "http://example.com/a.png".to_string(),
                width: 10,
                height: 20,
            },
            Logo {
                url: "http://example.com/b.png".to_string(),
                width: 30,
                height: 40,
            },
        ],
        ..Default::default()
    };

    let icons = channel.to_xmltv().icons;
    assert_eq!(icons.len(), 2);
    assert_eq!(icons[0].source, "http://example.com/a.png");
    assert_eq!((icons[1].width, icons[1].height), (30, 40));
}
