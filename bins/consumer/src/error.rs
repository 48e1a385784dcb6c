#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("missing {0}; set it in the config file, the environment or on the command line")]
    Missing(&'static str),

    #[error("{stage}: {source}")]
    Startup {
        stage: &'static str,
        #[source]
        source: telemetry_api::StageError,
    },

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}

impl ConsumerError {
    pub fn startup(stage: &'static str) -> impl FnOnce(telemetry_api::StageError) -> Self {
        move |source| Self::Startup { stage, source }
    }
}
