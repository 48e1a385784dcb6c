use std::time::Duration;

use clap::{Args, Parser};
use serde::Deserialize;

use broker_kafka::KafkaProducerConfig;
use telemetry_api::DeliveryMode;

use crate::error::ProducerError;

#[derive(Parser)]
#[command(name = "telemetry-producer", about = "Vehicle telemetry ingest API")]
pub struct Cli {
    #[command(flatten)]
    pub args: ProducerArgs,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub bootstrap_server: Option<String>,
    pub topic: Option<String>,
    pub listen: Option<String>,
    pub acks: Option<String>,
    pub delivery: Option<DeliveryMode>,
    pub ack_timeout_ms: Option<u64>,
    pub message_timeout_ms: Option<u64>,
    pub key_by_trip: Option<bool>,
}

pub fn load_config(path: &str) -> Result<Config, ProducerError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ProducerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
    toml::from_str(&content)
        .map_err(|e| ProducerError::Config { context: "parse", detail: format!("'{path}': {e}") })
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug, Default)]
pub struct ProducerArgs {
    /// Path to the TOML config file (optional)
    #[arg(long, default_value = "producer.toml", env = "PRODUCER_CONFIG")]
    pub config: String,

    /// Kafka bootstrap servers, e.g. localhost:9092
    #[arg(long, env = "BOOTSTRAP_SERVER")]
    pub bootstrap_server: Option<String>,

    /// Topic readings are published to
    #[arg(long, env = "KAFKA_TOPIC")]
    pub topic: Option<String>,

    /// HTTP listen address
    #[arg(long, env = "LISTEN_ADDR")]
    pub listen: Option<String>,

    /// Broker acknowledgment level: 0, 1 or all
    #[arg(long, env = "KAFKA_ACKS")]
    pub acks: Option<String>,

    /// fire_and_forget or sync_ack
    #[arg(long, env = "DELIVERY_MODE")]
    pub delivery: Option<DeliveryMode>,

    /// How long sync_ack waits for the broker
    #[arg(long, env = "ACK_TIMEOUT_MS")]
    pub ack_timeout_ms: Option<u64>,

    /// Key messages by trip_id
    #[arg(long, env = "KEY_BY_TRIP")]
    pub key_by_trip: Option<bool>,
}

// ═══════════════════════════════════════════════════════════════
//  Effective: merged config
// ═══════════════════════════════════════════════════════════════

pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";

/// Final configuration after merging: config.toml < env/CLI
#[derive(Debug)]
pub struct Effective {
    pub listen: String,
    pub topic: String,
    pub key_by_trip: bool,
    pub kafka: KafkaProducerConfig,
}

impl Effective {
    pub fn new(args: &ProducerArgs) -> Result<Self, ProducerError> {
        let cfg = match load_config(&args.config) {
            Ok(c) => c,
            Err(e) => {
                if std::path::Path::new(&args.config).exists() {
                    return Err(e);
                }
                Config::default()
            }
        };
        Self::merge(args, cfg)
    }

    fn merge(args: &ProducerArgs, cfg: Config) -> Result<Self, ProducerError> {
        let bootstrap = non_empty(args.bootstrap_server.clone().or(cfg.bootstrap_server))
            .ok_or(ProducerError::Missing("BOOTSTRAP_SERVER"))?;
        let topic = non_empty(args.topic.clone().or(cfg.topic))
            .ok_or(ProducerError::Missing("KAFKA_TOPIC"))?;

        let mut kafka = KafkaProducerConfig::new(bootstrap);
        if let Some(acks) = args.acks.clone().or(cfg.acks) {
            kafka.acks = acks;
        }
        kafka.delivery = args.delivery.or(cfg.delivery).unwrap_or_default();
        if let Some(ms) = args.ack_timeout_ms.or(cfg.ack_timeout_ms) {
            kafka.ack_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = cfg.message_timeout_ms {
            kafka.message_timeout_ms = ms;
        }

        Ok(Self {
            listen: args.listen.clone().or(cfg.listen).unwrap_or_else(|| DEFAULT_LISTEN.into()),
            topic,
            key_by_trip: args.key_by_trip.or(cfg.key_by_trip).unwrap_or(true),
            kafka,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
