#[derive(thiserror::Error, Debug)]
pub enum MonitoringError {
    #[error("monitoring request to {url} failed: {source}")]
    Request { url: String, source: reqwest::Error },
    #[error("monitoring backend returned an unsuccessful status {status} for {url}")]
    UnsuccessfulStatus { url: String, status: reqwest::StatusCode },
    #[error("failed to decode monitoring response from {url}: {source}")]
    Decode { url: String, source: reqwest::Error },
    #[error("failed to build monitoring http client: {0}")]
    ClientBuild(reqwest::Error),
}
