#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("missing {0}; set it in the config file, the environment or on the command line")]
    Missing(&'static str),

    #[error("kafka: {0}")]
    Broker(#[from] telemetry_api::StageError),

    #[error("{0}")]
    Ingest(#[from] ingest_api::IngestError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}
