#[derive(thiserror::Error, Debug)]
pub enum InventoryError {
    #[error("inventory request to {url} failed: {source}")]
    Request { url: String, source: reqwest::Error },
    #[error("inventory returned an unsuccessful status {status} for {url}")]
    UnsuccessfulStatus { url: String, status: reqwest::StatusCode },
    #[error("failed to decode inventory response from {url}: {source}")]
    Decode { url: String, source: reqwest::Error },
    #[error("inventory object not found: {0}")]
    NotFound(String),
}
