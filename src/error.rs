/// Failures a reminder handler can run into.
///
/// Handlers catch every variant at their own boundary and log it; none of them
/// reach the dispatch loop.
#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    /// Transport failure, non-success status, or an unusable response body.
    #[error("content provider error: {0}")]
    Provider(String),

    /// Settings, prayer times or location are absent from the store.
    #[error("missing data: {0}")]
    MissingData(&'static str),

    /// The notification surface rejected or failed to show a notification.
    #[error("notification surface error: {0}")]
    Surface(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("invalid content: {0}")]
    InvalidContent(String),

    #[error("unknown timer: {0}")]
    UnknownTimer(String),
}

pub type ReminderResult<T> = Result<T, ReminderError>;

impl From<reqwest::Error> for ReminderError {
    fn from(value: reqwest::Error) -> Self {
        Self::Provider(value.to_string())
    }
}

impl From<rusqlite::Error> for ReminderError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(value.to_string())
    }
}
