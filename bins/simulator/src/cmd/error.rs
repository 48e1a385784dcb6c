#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    #[error("{0}")]
    Config(String),

    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("health check {url} failed: {detail}")]
    Health { url: String, detail: String },
}
