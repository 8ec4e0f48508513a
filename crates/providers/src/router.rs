//! Builders that pick collaborator implementations from configuration.
//!
//! The invoker transport is decided here, once, at startup.

use std::sync::Arc;

use switchyard_config::{AppConfig, InvokerMode};
use switchyard_core::{CapabilityInvoker, Classifier, ContextSource};
use tracing::{info, warn};

use crate::context_source::HttpContextSource;
use crate::local::LocalInvoker;
use crate::openai_compat::OpenAiCompatClassifier;
use crate::remote::RemoteInvoker;

pub fn build_classifier(config: &AppConfig) -> Arc<dyn Classifier> {
    let c = &config.classifier;
    if c.api_key.is_none() {
        warn!("No classifier API key configured; every turn will fail until one is set");
    }
    Arc::new(
        OpenAiCompatClassifier::new(&c.api_url, c.api_key.clone(), &c.model, c.timeout_secs)
            .with_sampling(c.temperature, c.max_tokens),
    )
}

pub fn build_context_source(config: &AppConfig) -> Arc<dyn ContextSource> {
    Arc::new(HttpContextSource::new(
        &config.context.endpoint,
        config.context.timeout_secs,
    ))
}

/// Remote mode ignores `local`; local mode uses it as the handler registry.
pub fn build_invoker(config: &AppConfig, local: LocalInvoker) -> Arc<dyn CapabilityInvoker> {
    match config.delegation.mode {
        InvokerMode::Remote => {
            let invoker = RemoteInvoker::from_config(&config.delegation);
            info!(
                sales = invoker.is_enabled(switchyard_core::Capability::Sales),
                appointment = invoker.is_enabled(switchyard_core::Capability::Appointment),
                booking = invoker.is_enabled(switchyard_core::Capability::Booking),
                "Using remote capability invoker"
            );
            Arc::new(invoker)
        }
        InvokerMode::Local => {
            let registered = local.capabilities();
            if registered.is_empty() {
                warn!("Local invoker has no handlers; every delegation will fall back");
            }
            info!(capabilities = ?registered, "Using local capability invoker");
            Arc::new(local)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::InvokerKind;

    #[test]
    fn invoker_follows_mode() {
        let mut config = AppConfig::default();
        assert_eq!(build_invoker(&config, LocalInvoker::new()).kind(), InvokerKind::Remote);

        config.delegation.mode = InvokerMode::Local;
        assert_eq!(build_invoker(&config, LocalInvoker::new()).kind(), InvokerKind::Local);
    }

    #[test]
    fn classifier_is_openai() {
        assert_eq!(build_classifier(&AppConfig::default()).name(), "openai");
    }
}
