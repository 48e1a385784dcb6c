use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};

use telemetry_api::{StageError, TelemetryRecord, TelemetrySink};

const SQL_CREATE: &str = include_str!("../sql/create_telemetries.sql");

/// Table the sink writes to.
pub const TABLE: &str = "telemetries";

// ═══════════════════════════════════════════════════════════════
//  PostgresConfig
// ═══════════════════════════════════════════════════════════════

fn default_port() -> u16 {
    5432
}
fn default_sslmode() -> String {
    "prefer".into()
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    /// disable | allow | prefer | require | verify-ca | verify-full
    #[serde(default = "default_sslmode")]
    pub sslmode: String,
}

/// Map the config onto sqlx connect options. A bad `sslmode` is a config error.
pub fn connect_options(config: &PostgresConfig) -> Result<PgConnectOptions, StageError> {
    let ssl_mode = PgSslMode::from_str(&config.sslmode)
        .map_err(|e| StageError::config(format!("sslmode '{}': {e}", config.sslmode)))?;
    Ok(PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.database)
        .ssl_mode(ssl_mode))
}

// ═══════════════════════════════════════════════════════════════
//  PostgresSink
// ═══════════════════════════════════════════════════════════════

/// PostgreSQL TelemetrySink.
///
/// One row per record in `telemetries`, columns mirroring the record fields.
/// There is no key or uniqueness constraint, so redelivered messages show
/// up as duplicate rows. Writes go through a single connection: the
/// dispatch loop is the only writer and stores one record at a time.
pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StageError> {
        let options = connect_options(config)?;
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StageError::io(format!("connect {}:{}/{}: {e}", config.host, config.port, config.database)))?;
        tracing::info!(host = %config.host, port = config.port, database = %config.database, "connected to postgres");
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn create_table_sql() -> String {
    SQL_CREATE.replace("{table}", TABLE)
}

fn insert_sql() -> String {
    format!(r#"INSERT INTO {TABLE} (trip_id, lat, "long", speed, "timestamp") VALUES ($1, $2, $3, $4, $5)"#)
}

impl TelemetrySink for PostgresSink {
    fn init(&self) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>> {
        Box::pin(async {
            sqlx::query(&create_table_sql())
                .execute(&self.pool)
                .await
                .map_err(|e| StageError::io(format!("migrate {TABLE}: {e}")))?;
            tracing::info!(table = TABLE, "schema ready");
            Ok(())
        })
    }

    fn store<'a>(&'a self, record: &'a TelemetryRecord)
        -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + 'a>>
    {
        Box::pin(async move {
            sqlx::query(&insert_sql())
                .bind(&record.trip_id)
                .bind(record.lat)
                .bind(record.long)
                .bind(record.speed)
                .bind(&record.timestamp)
                .execute(&self.pool)
                .await
                .map_err(|e| StageError::io(format!("insert into {TABLE}: {e}")))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use telemetry_api::ErrorKind;

    use super::*;

    fn config(sslmode: &str) -> PostgresConfig {
        PostgresConfig {
            host: "db.internal".into(),
            port: 6432,
            user: "fleet".into(),
            password: "secret".into(),
            database: "telemetry".into(),
            sslmode: sslmode.into(),
        }
    }

    #[test]
    fn options_follow_config() {
        let options = connect_options(&config("require")).unwrap();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6432);
        assert_eq!(options.get_username(), "fleet");
        assert_eq!(options.get_database(), Some("telemetry"));
        assert!(matches!(options.get_ssl_mode(), PgSslMode::Require));
    }

    #[test]
    fn bad_sslmode_is_config_error() {
        let err = connect_options(&config("sometimes")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn config_defaults_from_toml() {
        let config: PostgresConfig = toml::from_str(
            r#"
            host = "localhost"
            user = "postgres"
            database = "fleet"
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 5432);
        assert_eq!(config.password, "");
        assert_eq!(config.sslmode, "prefer");
    }

    #[test]
    fn schema_has_five_columns_and_no_constraints() {
        let sql = create_table_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS telemetries"));
        for column in ["trip_id", "lat", "\"long\"", "speed", "\"timestamp\""] {
            assert!(sql.contains(column), "missing column {column}");
        }
        assert!(!sql.to_uppercase().contains("PRIMARY KEY"));
        assert!(!sql.to_uppercase().contains("UNIQUE"));
        assert_eq!(insert_sql().matches('$').count(), 5);
    }
}
