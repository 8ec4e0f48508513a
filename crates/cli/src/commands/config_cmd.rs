//! `switchyard config`: Configuration inspection commands.

use switchyard_config::{AppConfig, ConfigError};

pub fn show(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config.redacted_toml());
    Ok(())
}

pub fn default() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::default_toml());
    Ok(())
}

pub fn path() {
    println!("{}", AppConfig::config_path().display());
}

pub fn validate(config: Result<AppConfig, ConfigError>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating {}", AppConfig::config_path().display());

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    };

    let warnings = warnings_for(&config);
    if warnings.is_empty() {
        println!("   All checks passed");
    } else {
        for w in &warnings {
            println!("   Warning: {w}");
        }
    }

    println!();
    println!("   Model:       {}", config.classifier.model);
    println!("   Gateway:     {}:{}", config.server.host, config.server.port);
    println!("   Invoker:     {}", config.delegation.mode.as_str());
    println!("   Turn limit:  {}s", config.turn_timeout_secs);
    Ok(())
}

/// Problems that do not stop the service from starting.
fn warnings_for(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.has_api_key() {
        warnings.push("No classifier API key set (OPENAI_API_KEY)".to_string());
    }

    let endpoints = &config.delegation.capabilities;
    for (name, endpoint) in [
        ("sales", &endpoints.sales),
        ("appointment", &endpoints.appointment),
        ("booking", &endpoints.booking),
    ] {
        if !endpoint.is_usable() {
            warnings.push(format!("Capability '{name}' is disabled; its turns will fall back"));
        }
    }

    if config.turn_timeout_secs <= config.classifier.timeout_secs + config.delegation.timeout_secs {
        warnings.push(format!(
            "turn_timeout_secs ({}) is not larger than classifier + delegation timeouts ({}s)",
            config.turn_timeout_secs,
            config.classifier.timeout_secs + config.delegation.timeout_secs
        ));
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_only_warn_about_missing_key() {
        let warnings = warnings_for(&AppConfig::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("API key"));
    }

    #[test]
    fn disabled_capability_is_reported() {
        let mut config = AppConfig::default();
        config.classifier.api_key = Some("sk-test".into());
        config.delegation.capabilities.booking.enabled = false;

        let warnings = warnings_for(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("booking"));
    }

    #[test]
    fn tight_turn_timeout_is_reported() {
        let mut config = AppConfig::default();
        config.classifier.api_key = Some("sk-test".into());
        config.turn_timeout_secs = 50;

        let warnings = warnings_for(&config);
        assert!(warnings.iter().any(|w| w.contains("turn_timeout_secs (50)")));
    }
}
