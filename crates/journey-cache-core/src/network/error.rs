use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Host unreachable: {0}")]
    Unreachable(String),
}
