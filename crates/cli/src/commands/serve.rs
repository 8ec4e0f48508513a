//! `switchyard serve`: Start the HTTP gateway.

use switchyard_config::AppConfig;
use switchyard_providers::LocalInvoker;

pub async fn run(
    mut config: AppConfig,
    host_override: Option<String>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(host) = host_override {
        config.server.host = host;
    }
    if let Some(port) = port_override {
        config.server.port = port;
    }

    println!("switchyard gateway");
    println!("   Listening:  {}:{}", config.server.host, config.server.port);
    println!("   Classifier: {}", config.classifier.model);
    println!("   Invoker:    {}", config.delegation.mode.as_str());
    if !config.has_api_key() {
        println!("   Warning:    no classifier API key set (OPENAI_API_KEY)");
    }

    // The binary ships no in-process capabilities; local mode is for embedders.
    switchyard_gateway::start(config, LocalInvoker::new()).await?;

    Ok(())
}
