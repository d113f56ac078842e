use crate::config::GuildvaultConfig;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::{debug, warn};
use tracing_subscriber::fmt::time::ChronoUtc;
use twilight_gateway::{
    cluster::{Cluster, ClusterBuilder},
    Intents,
};

const BOT_TOKEN_PREFIX: &str = "Bot ";
const BEARER_TOKEN_PREFIX: &str = "Bearer ";

pub fn init(config: &GuildvaultConfig) {
    tracing_subscriber::fmt()
        .with_level(true)
        .with_thread_ids(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .init();

    debug!(
        "Loaded config: prefix={:?} export_dir={:?} throttle={:?}",
        config.command_prefix, config.backup.export_dir, config.throttle
    );

    let metrics_port = match config.metrics.port {
        Some(port) => port,
        None => return,
    };
    if let Err(err) = metrics_exporter(metrics_port).install() {
        warn!("Failed to set up Prometheus metrics exporter: {}", err);
        return;
    }

    debug!(
        "Metrics endpoint listening on http://0.0.0.0:{}",
        metrics_port
    );
}

fn metrics_exporter(port: u16) -> PrometheusBuilder {
    let socket = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port);
    PrometheusBuilder::new().with_http_listener(socket)
}

/// twilight-http prefixes `Bot ` to any token that carries no scheme, so a
/// bare user token is presented to Discord as a bot token.
fn token_notice(token: &str) -> Option<&'static str> {
    if token.starts_with(BOT_TOKEN_PREFIX) || token.starts_with(BEARER_TOKEN_PREFIX) {
        None
    } else {
        Some("The configured token has no `Bot ` prefix. It will be sent as a bot token; user-account tokens are not supported.")
    }
}

pub fn http_client(config: &GuildvaultConfig) -> twilight_http::Client {
    debug!("Creating Discord HTTP client");
    if let Some(notice) = token_notice(&config.discord.token) {
        warn!("{}", notice);
    }
    // Use the twilight HTTP proxy when configured
    if let Some(proxy) = config.discord.proxy.as_ref() {
        twilight_http::Client::builder()
            .token(config.discord.token.clone())
            .proxy(proxy.clone(), true)
            .ratelimiter(None)
            .build()
    } else {
        twilight_http::Client::new(config.discord.token.clone())
    }
}

pub fn cluster(config: &GuildvaultConfig, intents: Intents) -> ClusterBuilder {
    debug!("Creating Discord gateway cluster");
    Cluster::builder(config.discord.token.clone(), intents)
}
