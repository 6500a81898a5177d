use uuid::Uuid;

/// Failure modes of a single snapshot fetch or control request.
///
/// The poller treats all three kinds the same way for scheduling (the next
/// tick retries regardless); the distinction is surfaced to subscribers in
/// the published status message.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// No route to the server, connect failure, or timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("server returned {status}{}", format_body(.body))]
    Protocol { status: u16, body: Option<String> },

    /// The response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

fn format_body(body: &Option<String>) -> String {
    match body {
        Some(text) => format!(": {text}"),
        None => String::new(),
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Persistence-layer failures (disk full, lock contention, corruption).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("metric id {0} already recorded")]
    DuplicateMetricId(Uuid),

    #[error("bucket width must be positive")]
    InvalidBucketWidth,

    #[error("stored row is malformed: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Errors raised by control operations (pause/resume/retry/cancel).
///
/// Unlike passive poll-cycle failures these propagate synchronously to the
/// caller so the initiating action can show what went wrong.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is missing")]
    Missing(&'static str),

    #[error("{key} is not valid: {value}")]
    Invalid { key: &'static str, value: String },
}
