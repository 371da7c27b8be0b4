use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ConfigError(pub String);

/// Failure of a single database call. Callers decide per variant whether
/// the call is worth repeating.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DbError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("statement timed out: {0}")]
    Timeout(String),

    #[error("plan output malformed: {0}")]
    MalformedPlan(String),
}

impl DbError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Connection(_))
    }
}

const QUERY_CANCELED: &str = "57014";

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(QUERY_CANCELED) => {
                DbError::Timeout(e.to_string())
            }
            sqlx::Error::Configuration(_)
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => DbError::Connection(e.to_string()),
            _ => DbError::Execution(e.to_string()),
        }
    }
}

/// Failure reported by a rewrite-engine provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider response malformed: {0}")]
    Malformed(String),

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_) | ProviderError::Malformed(_) => true,
            ProviderError::Status { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            ProviderError::Other(_) => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Malformed(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("rewrite engine failed after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: ProviderError },

    #[error("rewrite engine rejected the request: {0}")]
    Rejected(ProviderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_retry_classes() {
        assert!(ProviderError::Transport("reset".into()).is_retryable());
        assert!(ProviderError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(ProviderError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(!ProviderError::Status { status: 401, body: String::new() }.is_retryable());
        assert!(!ProviderError::Other("replay miss".into()).is_retryable());
    }

    #[test]
    fn test_only_connection_errors_are_transient() {
        assert!(DbError::Connection("refused".into()).is_transient());
        assert!(!DbError::Execution("syntax error".into()).is_transient());
        assert!(!DbError::Timeout("57014".into()).is_transient());
    }
}
