/// Errors surfaced by the chain gateway.
///
/// `EmptyValue` is the chain's "not present" sentinel. It is a normal
/// outcome for many queries and must stay distinguishable from transport
/// failures, which are retryable.
#[derive(thiserror::Error, Debug)]
pub enum ChainError {
    #[error("chain returned an empty value")]
    EmptyValue,

    #[error("chain transport error: {0}")]
    Transport(String),

    #[error("chain rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("could not decode chain response: {0}")]
    Decode(String),
}

impl ChainError {
    pub fn is_empty(&self) -> bool {
        matches!(self, ChainError::EmptyValue)
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        ChainError::Transport(e.to_string())
    }
}
