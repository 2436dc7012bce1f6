use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use anyhow::Context;
use clap::Parser;
use log::{error, info};
use strict_fetch::{
    cli::{Cli, Commands},
    config::{ClientConfig, load_configuration},
    http::{Endpoint, FetchClient, RequestOptions, ResponseEnvelope},
    log::init_logging,
    polling::{LongPolling, LongPollingOptions},
};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    init_logging()?;

    let config = load_configuration(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    let transport = Arc::new(config.transport()?);
    let client = config.client(transport);

    match cli.command {
        Commands::Request {
            endpoint,
            method,
            base_url,
            request,
        } => {
            let client = with_base_url(client, base_url);
            let envelope = client
                .fetch(&Endpoint::new(method, endpoint), request.to_options())
                .await?;
            print_envelope(&envelope)
        },
        Commands::Call { name, request } => {
            let envelope = config.endpoints(&client).call(&name, request.to_options()).await?;
            print_envelope(&envelope)
        },
        Commands::Poll {
            endpoint,
            method,
            base_url,
            timeout,
            max_timeouts,
            delay,
            count,
            request,
        } => {
            let options = polling_options(&config, timeout, max_timeouts, delay);
            let client = with_base_url(client, base_url);
            poll(client, Endpoint::new(method, endpoint), request.to_options(), options, count).await
        },
        Commands::Endpoints => {
            for name in config.endpoints(&client).names() {
                println!("{name}");
            }
            Ok(())
        },
    }
}

fn with_base_url(client: FetchClient, base_url: Option<String>) -> FetchClient {
    match base_url {
        Some(base_url) => client.with_base_url(base_url),
        None => client,
    }
}

fn polling_options(
    config: &ClientConfig,
    timeout: Option<f64>,
    max_timeouts: Option<u32>,
    delay: Option<u64>,
) -> LongPollingOptions {
    let defaults = &config.polling;
    LongPollingOptions {
        timeout_secs: timeout.unwrap_or(defaults.timeout_secs),
        max_consecutive_timeouts: max_timeouts.unwrap_or(defaults.max_consecutive_timeouts),
        auto_start: false,
        delay_millis: delay.unwrap_or(defaults.delay_millis),
    }
}

fn print_envelope(envelope: &ResponseEnvelope) -> Result<(), anyhow::Error> {
    let json = serde_json::to_string_pretty(envelope).context("Failed to encode response envelope")?;
    println!("{json}");
    Ok(())
}

async fn poll(
    client: FetchClient,
    endpoint: Endpoint,
    request: RequestOptions,
    options: LongPollingOptions,
    count: Option<u64>,
) -> Result<(), anyhow::Error> {
    let received = Arc::new(AtomicU64::new(0));
    let polling = LongPolling::new(client, endpoint, request, options, {
        let received = Arc::clone(&received);
        move |envelope| {
            if let Err(e) = print_envelope(envelope) {
                error!(error:% = e; "Failed to print envelope");
            }
            let seen = received.fetch_add(1, Ordering::SeqCst) + 1;
            count.is_none_or(|count| seen < count)
        }
    });
    polling.start();

    tokio::select! {
        _ = polling.stopped() => {},
        result = signal::ctrl_c() => {
            result.context("Failed to listen for ctrl_c")?;
            polling.stop();
        },
    }

    info!(responses = received.load(Ordering::SeqCst); "Long-polling finished");
    Ok(())
}
