use std::time::Duration;

use clap::{Args, Parser};
use serde::Deserialize;

use broker_kafka::KafkaConsumerConfig;
use dispatch::DispatchConfig;
use storage_memory::MemorySinkConfig;
use storage_postgres::PostgresConfig;
use telemetry_api::CommitPolicy;

use crate::error::ConsumerError;

#[derive(Parser)]
#[command(name = "telemetry-consumer", about = "Kafka to Postgres telemetry dispatcher")]
pub struct Cli {
    #[command(flatten)]
    pub args: ConsumerArgs,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub bootstrap_server: Option<String>,
    pub topic: Option<String>,
    pub poll_timeout_ms: Option<u64>,
    pub commit: Option<CommitPolicy>,
    pub dry_run: Option<bool>,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub memory: MemorySinkConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct DatabaseSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub sslmode: Option<String>,
}

pub fn load_config(path: &str) -> Result<Config, ConsumerError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConsumerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
    toml::from_str(&content)
        .map_err(|e| ConsumerError::Config { context: "parse", detail: format!("'{path}': {e}") })
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug, Default)]
pub struct ConsumerArgs {
    /// Path to the TOML config file (optional)
    #[arg(long, default_value = "consumer.toml", env = "CONSUMER_CONFIG")]
    pub config: String,

    /// Kafka bootstrap servers, e.g. localhost:9092
    #[arg(long, env = "BOOTSTRAP_SERVER")]
    pub bootstrap_server: Option<String>,

    /// Topic to consume
    #[arg(long, env = "KAFKA_TOPIC")]
    pub topic: Option<String>,

    /// Bound on each poll, in milliseconds
    #[arg(long, env = "POLL_TIMEOUT_MS")]
    pub poll_timeout_ms: Option<u64>,

    /// after_store or auto
    #[arg(long, env = "COMMIT_POLICY")]
    pub commit: Option<CommitPolicy>,

    #[arg(long, env = "DB_HOST")]
    pub db_host: Option<String>,

    #[arg(long, env = "DB_PORT")]
    pub db_port: Option<u16>,

    #[arg(long, env = "DB_USER")]
    pub db_user: Option<String>,

    #[arg(long, env = "DB_PASS", hide_env_values = true)]
    pub db_pass: Option<String>,

    #[arg(long, env = "DB_NAME")]
    pub db_name: Option<String>,

    /// disable, allow, prefer, require, verify-ca or verify-full
    #[arg(long, env = "DB_SSLMODE")]
    pub db_sslmode: Option<String>,

    /// Store into memory instead of Postgres; no database settings needed
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,
}

// ═══════════════════════════════════════════════════════════════
//  Effective: merged config
// ═══════════════════════════════════════════════════════════════

#[derive(Debug)]
pub enum Storage {
    Postgres(PostgresConfig),
    Memory(MemorySinkConfig),
}

/// Final configuration after merging: config.toml < env/CLI
#[derive(Debug)]
pub struct Effective {
    pub topic: String,
    pub kafka: KafkaConsumerConfig,
    pub dispatch: DispatchConfig,
    pub storage: Storage,
}

impl Effective {
    pub fn new(args: &ConsumerArgs) -> Result<Self, ConsumerError> {
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

    fn merge(args: &ConsumerArgs, cfg: Config) -> Result<Self, ConsumerError> {
        let bootstrap = non_empty(args.bootstrap_server.clone().or(cfg.bootstrap_server))
            .ok_or(ConsumerError::Missing("BOOTSTRAP_SERVER"))?;
        let topic = non_empty(args.topic.clone().or(cfg.topic))
            .ok_or(ConsumerError::Missing("KAFKA_TOPIC"))?;

        let mut dispatch = DispatchConfig::default();
        if let Some(ms) = args.poll_timeout_ms.or(cfg.poll_timeout_ms) {
            dispatch.poll_timeout = Duration::from_millis(ms);
        }
        dispatch.commit = args.commit.or(cfg.commit).unwrap_or_default();

        let mut kafka = KafkaConsumerConfig::new(bootstrap);
        kafka.commit = dispatch.commit;

        let storage = if args.dry_run || cfg.dry_run.unwrap_or(false) {
            cfg.memory
                .validate()
                .map_err(|e| ConsumerError::Config { context: "memory", detail: e.message })?;
            Storage::Memory(cfg.memory)
        } else {
            let db = cfg.database;
            Storage::Postgres(PostgresConfig {
                host: non_empty(args.db_host.clone().or(db.host)).ok_or(ConsumerError::Missing("DB_HOST"))?,
                port: args.db_port.or(db.port).unwrap_or(5432),
                user: non_empty(args.db_user.clone().or(db.user)).ok_or(ConsumerError::Missing("DB_USER"))?,
                password: args.db_pass.clone().or(db.password).unwrap_or_default(),
                database: non_empty(args.db_name.clone().or(db.name)).ok_or(ConsumerError::Missing("DB_NAME"))?,
                sslmode: non_empty(args.db_sslmode.clone().or(db.sslmode)).unwrap_or_else(|| "prefer".into()),
            })
        };

        Ok(Self { topic, kafka, dispatch, storage })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ConsumerArgs {
        ConsumerArgs {
            config: "does-not-exist.toml".into(),
            bootstrap_server: Some("localhost:9092".into()),
            topic: Some("vehicle-telemetry".into()),
            db_host: Some("db".into()),
            db_user: Some("fleet".into()),
            db_name: Some("telemetry".into()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_apply_when_only_required_values_are_set() {
        let eff = Effective::new(&args()).unwrap();
        assert_eq!(eff.topic, "vehicle-telemetry");
        assert_eq!(eff.kafka.group_id, telemetry_api::CONSUMER_GROUP);
        assert_eq!(eff.kafka.commit, CommitPolicy::AfterStore);
        assert_eq!(eff.dispatch.poll_timeout, Duration::from_millis(100));
        let Storage::Postgres(db) = eff.storage else {
            panic!("expected postgres storage");
        };
        assert_eq!(db.host, "db");
        assert_eq!(db.port, 5432);
        assert_eq!(db.password, "");
        assert_eq!(db.sslmode, "prefer");
    }

    #[test]
    fn database_settings_are_required_unless_dry_run() {
        let mut a = args();
        a.db_host = None;
        assert!(matches!(Effective::new(&a), Err(ConsumerError::Missing("DB_HOST"))));

        a.dry_run = true;
        let eff = Effective::new(&a).unwrap();
        assert!(matches!(eff.storage, Storage::Memory(_)));
    }

    #[test]
    fn missing_kafka_settings_are_errors() {
        let mut a = args();
        a.bootstrap_server = Some(String::new());
        assert!(matches!(Effective::new(&a), Err(ConsumerError::Missing("BOOTSTRAP_SERVER"))));

        let mut a = args();
        a.topic = None;
        assert!(matches!(Effective::new(&a), Err(ConsumerError::Missing("KAFKA_TOPIC"))));
    }

    #[test]
    fn file_sections_fill_in_and_args_override() {
        let cfg: Config = toml::from_str(
            r#"
            bootstrap_server = "file:9092"
            poll_timeout_ms = 250
            commit = "auto"

            [database]
            host = "file-db"
            port = 6543
            password = "secret"
            sslmode = "require"
            "#,
        )
        .unwrap();

        let eff = Effective::merge(&args(), cfg).unwrap();
        assert_eq!(eff.kafka.bootstrap_servers, "localhost:9092");
        assert_eq!(eff.dispatch.poll_timeout, Duration::from_millis(250));
        assert_eq!(eff.dispatch.commit, CommitPolicy::Auto);
        assert_eq!(eff.kafka.commit, CommitPolicy::Auto);
        let Storage::Postgres(db) = eff.storage else {
            panic!("expected postgres storage");
        };
        assert_eq!(db.host, "db");
        assert_eq!(db.port, 6543);
        assert_eq!(db.password, "secret");
        assert_eq!(db.sslmode, "require");
    }

    #[test]
    fn dry_run_from_file_uses_memory_section() {
        let cfg: Config = toml::from_str(
            r#"
            dry_run = true

            [memory]
            max_records = 10
            "#,
        )
        .unwrap();
        let a = ConsumerArgs {
            bootstrap_server: Some("k:9092".into()),
            topic: Some("t".into()),
            ..Default::default()
        };
        let eff = Effective::merge(&a, cfg).unwrap();
        let Storage::Memory(mem) = eff.storage else {
            panic!("expected memory storage");
        };
        assert_eq!(mem.max_records, 10);
    }

    #[test]
    fn zero_memory_capacity_is_a_config_error() {
        let cfg: Config = toml::from_str("[memory]\nmax_records = 0").unwrap();
        let mut a = args();
        a.dry_run = true;
        assert!(matches!(
            Effective::merge(&a, cfg),
            Err(ConsumerError::Config { context: "memory", .. })
        ));
    }
}
