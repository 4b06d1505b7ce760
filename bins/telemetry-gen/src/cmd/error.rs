#[derive(Debug, thiserror::Error)]
pub enum GenError {
    #[error("{0}")]
    Config(String),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
}
