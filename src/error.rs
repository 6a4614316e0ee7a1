use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GdcError {
    #[error("GDC request to {endpoint} failed (params: {params})")]
    #[diagnostic(help("the portal may be unavailable; rerun later to resume from the progress log"))]
    Request {
        endpoint: String,
        params: String,
        #[source]
        source: RequestFailure,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpSetup(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("invalid configuration: {0}")]
    ConfigParse(String),

    #[error("invalid gene symbol: {0}")]
    InvalidGeneSymbol(String),

    #[error("invalid primary site: {0}")]
    InvalidSite(String),

    #[error("failed to read census gene list at {path}: {message}")]
    CensusRead { path: Utf8PathBuf, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to write report: {0}")]
    Output(String),
}

/// Underlying cause of a failed logical request.
#[derive(Debug, Error)]
pub enum RequestFailure {
    #[error("portal returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("gave up after {attempts} attempts, last failure: {last}")]
    RetriesExhausted { attempts: usize, last: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl GdcError {
    pub fn is_request(&self) -> bool {
        matches!(self, GdcError::Request { .. })
    }
}
