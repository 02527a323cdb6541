/// Markers TEE implementations embed in gRPC status messages. Matched once
/// here so the rest of the crate works with named variants.
const DEADLINE_MARKER: &str = "context deadline exceeded";
const BUSY_MARKER: &str = "is being fully calculated";

#[derive(thiserror::Error, Debug)]
pub enum TeeError {
    /// The worker did not finish within the request deadline.
    #[error("tee deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The worker is saturated and asked us to come back later.
    #[error("tee busy: {0}")]
    Busy(String),

    #[error("tee transport error: {0}")]
    Transport(String),

    #[error("tee rejected the request: {0}")]
    Status(String),

    #[error("invalid tee endpoint `{0}`")]
    InvalidEndpoint(String),

    #[error("no verifier endpoint answered")]
    NoVerifier,
}

impl TeeError {
    /// Retryable with a grown deadline.
    pub fn is_deadline(&self) -> bool {
        matches!(self, TeeError::DeadlineExceeded(_))
    }

    /// Retryable without growing the deadline.
    pub fn is_busy(&self) -> bool {
        matches!(self, TeeError::Busy(_))
    }
}

impl From<tonic::Status> for TeeError {
    fn from(status: tonic::Status) -> Self {
        let message = status.message().to_string();
        if status.code() == tonic::Code::DeadlineExceeded || message.contains(DEADLINE_MARKER) {
            TeeError::DeadlineExceeded(message)
        } else if message.contains(BUSY_MARKER) {
            TeeError::Busy(message)
        } else {
            TeeError::Status(format!("{}: {message}", status.code()))
        }
    }
}

impl From<tonic::transport::Error> for TeeError {
    fn from(e: tonic::transport::Error) -> Self {
        TeeError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_deadline_marker() {
        let status = tonic::Status::unavailable("rpc error: context deadline exceeded");
        assert!(TeeError::from(status).is_deadline());
    }

    #[test]
    fn classifies_deadline_code() {
        let status = tonic::Status::deadline_exceeded("timed out");
        assert!(TeeError::from(status).is_deadline());
    }

    #[test]
    fn classifies_busy_marker() {
        let status = tonic::Status::resource_exhausted("proof is being fully calculated");
        assert!(TeeError::from(status).is_busy());
    }

    #[test]
    fn other_statuses_are_terminal() {
        let err = TeeError::from(tonic::Status::invalid_argument("bad proof"));
        assert!(!err.is_deadline() && !err.is_busy());
    }
}
