use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::{Certificate, Channel, ClientTlsConfig};
use tracing::{info, warn};

use crate::error::TeeError;
use crate::proto::*;

/// Root certificate the verification workers present on `:443` endpoints.
const TEE_CA_PEM: &[u8] = include_bytes!("../certs/tee-ca.pem");

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Deadline schedule for one verification call. Deadline-exceeded failures
/// consume an attempt and grow the timeout by `step`; busy failures retry
/// without consuming an attempt; anything else is terminal.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base: Duration,
    pub step: Duration,
    pub attempts: u32,
    pub pause: Duration,
}

impl RetryPolicy {
    /// The per-attempt timeouts this policy will use, in order.
    pub fn timeouts(&self) -> Vec<Duration> {
        (0..self.attempts).map(|i| self.base + self.step * i).collect()
    }
}

pub const SINGLE_BLOCK_POLICY: RetryPolicy = RetryPolicy {
    base: Duration::from_secs(600),
    step: Duration::from_secs(600),
    attempts: 3,
    pause: Duration::from_secs(60),
};

pub const TOTAL_POLICY: RetryPolicy = RetryPolicy {
    base: Duration::from_secs(180),
    step: Duration::from_secs(180),
    attempts: 3,
    pause: Duration::from_secs(60),
};

/// The resume path re-verifies a full proof list in one shot and affords the
/// worker the long deadline from the start.
pub const TOTAL_RESUME_POLICY: RetryPolicy = RetryPolicy {
    base: Duration::from_secs(600),
    step: Duration::from_secs(600),
    attempts: 3,
    pause: Duration::from_secs(120),
};

pub const BATCH_POLICY: RetryPolicy = RetryPolicy {
    base: Duration::from_secs(600),
    step: Duration::from_secs(600),
    attempts: 3,
    pause: Duration::from_secs(180),
};

/// Client surface the challenge controllers verify proofs through.
#[async_trait]
pub trait TeeVerifier: Send + Sync {
    /// Verify one space-proof block on the chain-allocated worker.
    async fn verify_space_proof(
        &self,
        endpoint: &str,
        request: SpaceProofVerifyRequest,
    ) -> Result<SpaceProofVerifyResponse, TeeError>;

    /// Verify the assembled block list and obtain the aggregate verdict.
    async fn verify_space_proof_total(
        &self,
        endpoint: &str,
        request: SpaceProofVerifyTotalRequest,
        policy: &RetryPolicy,
    ) -> Result<SpaceProofVerifyTotalResponse, TeeError>;

    /// Batch-verify PoR samples on the first verifier endpoint that answers.
    async fn batch_verify(
        &self,
        endpoints: &[String],
        request: BatchVerifyRequest,
    ) -> Result<BatchVerifyResponse, TeeError>;

    /// Fold the per-batch history into the final chain-consumable signature.
    async fn aggregate_signature(
        &self,
        endpoints: &[String],
        request: AggregateSignatureRequest,
    ) -> Result<AggregateSignatureResponse, TeeError>;

    /// Ask a marker worker to (re)compute a fragment tag.
    async fn gen_tag(
        &self,
        endpoints: &[String],
        request: GenTagRequest,
    ) -> Result<GenTagResponse, TeeError>;
}

/// Connect to a worker. Endpoints carrying the `:443` marker get TLS with
/// the pinned root certificate; everything else is plaintext.
async fn connect(endpoint: &str, timeout: Duration) -> Result<Channel, TeeError> {
    let secure = endpoint.contains("443");
    let uri = if secure {
        format!("https://{endpoint}")
    } else {
        format!("http://{endpoint}")
    };
    let mut builder = Channel::from_shared(uri)
        .map_err(|_| TeeError::InvalidEndpoint(endpoint.to_string()))?
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout);
    if secure {
        let tls = ClientTlsConfig::new().ca_certificate(Certificate::from_pem(TEE_CA_PEM));
        builder = builder.tls_config(tls)?;
    }
    Ok(builder.connect().await?)
}

pub(crate) async fn retry<T, F, Fut>(policy: &RetryPolicy, mut call: F) -> Result<T, TeeError>
where
    F: FnMut(Duration) -> Fut,
    Fut: Future<Output = Result<T, TeeError>>,
{
    let mut attempt = 0;
    let mut timeout = policy.base;
    loop {
        match call(timeout).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_busy() => {
                warn!("tee busy, retrying: {e}");
            }
            Err(e) if e.is_deadline() => {
                attempt += 1;
                if attempt >= policy.attempts {
                    return Err(e);
                }
                timeout += policy.step;
                warn!("tee deadline exceeded, growing timeout to {timeout:?}: {e}");
            }
            Err(e) => return Err(e),
        }
        tokio::time::sleep(policy.pause).await;
    }
}

/// gRPC implementation of [`TeeVerifier`]. Dials per call; workers hold no
/// client state between verifications.
#[derive(Default, Clone)]
pub struct GrpcVerifier;

impl GrpcVerifier {
    async fn call_once<T, R, F, Fut>(
        endpoint: &str,
        timeout: Duration,
        request: &R,
        rpc: F,
    ) -> Result<T, TeeError>
    where
        R: Clone,
        F: FnOnce(VerifierClient<Channel>, R) -> Fut,
        Fut: Future<Output = Result<tonic::Response<T>, tonic::Status>>,
    {
        let channel = connect(endpoint, timeout).await?;
        let client = VerifierClient::new(channel)
            .max_decoding_message_size(usize::MAX)
            .max_encoding_message_size(usize::MAX);
        let fut = rpc(client, request.clone());
        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(resp)) => Ok(resp.into_inner()),
            Ok(Err(status)) => Err(status.into()),
            Err(_) => Err(TeeError::DeadlineExceeded(format!(
                "no answer from {endpoint} within {timeout:?}"
            ))),
        }
    }

    /// Try each verifier-role endpoint once per attempt round; the first
    /// success wins.
    async fn call_any<T, R, F, Fut>(
        endpoints: &[String],
        request: &R,
        rpc: F,
    ) -> Result<T, TeeError>
    where
        R: Clone,
        F: Fn(VerifierClient<Channel>, R) -> Fut + Copy,
        Fut: Future<Output = Result<tonic::Response<T>, tonic::Status>>,
    {
        let mut last = TeeError::NoVerifier;
        for endpoint in endpoints {
            match Self::call_once(endpoint, BATCH_POLICY.base, request, rpc).await {
                Ok(value) => {
                    info!("tee {endpoint} answered");
                    return Ok(value);
                }
                Err(e) => {
                    warn!("tee {endpoint} failed: {e}");
                    last = e;
                }
            }
        }
        Err(last)
    }
}

#[async_trait]
impl TeeVerifier for GrpcVerifier {
    async fn verify_space_proof(
        &self,
        endpoint: &str,
        request: SpaceProofVerifyRequest,
    ) -> Result<SpaceProofVerifyResponse, TeeError> {
        retry(&SINGLE_BLOCK_POLICY, |timeout| {
            let request = request.clone();
            async move {
                Self::call_once(endpoint, timeout, &request, |mut client, req| async move {
                    client.verify_space_proof(req).await
                })
                .await
            }
        })
        .await
    }

    async fn verify_space_proof_total(
        &self,
        endpoint: &str,
        request: SpaceProofVerifyTotalRequest,
        policy: &RetryPolicy,
    ) -> Result<SpaceProofVerifyTotalResponse, TeeError> {
        retry(policy, |timeout| {
            let request = request.clone();
            async move {
                Self::call_once(endpoint, timeout, &request, |mut client, req| async move {
                    client.verify_space_proof_total(req).await
                })
                .await
            }
        })
        .await
    }

    async fn batch_verify(
        &self,
        endpoints: &[String],
        request: BatchVerifyRequest,
    ) -> Result<BatchVerifyResponse, TeeError> {
        Self::call_any(endpoints, &request, |mut client, req| async move {
            client.batch_verify(req).await
        })
        .await
    }

    async fn aggregate_signature(
        &self,
        endpoints: &[String],
        request: AggregateSignatureRequest,
    ) -> Result<AggregateSignatureResponse, TeeError> {
        Self::call_any(endpoints, &request, |mut client, req| async move {
            client.aggregate_signature(req).await
        })
        .await
    }

    async fn gen_tag(
        &self,
        endpoints: &[String],
        request: GenTagRequest,
    ) -> Result<GenTagResponse, TeeError> {
        Self::call_any(endpoints, &request, |mut client, req| async move {
            client.gen_tag(req).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn single_block_timeout_schedule() {
        let mins: Vec<u64> = SINGLE_BLOCK_POLICY
            .timeouts()
            .iter()
            .map(|d| d.as_secs() / 60)
            .collect();
        assert_eq!(mins, vec![10, 20, 30]);
    }

    #[test]
    fn total_timeout_schedule() {
        let mins: Vec<u64> = TOTAL_POLICY.timeouts().iter().map(|d| d.as_secs() / 60).collect();
        assert_eq!(mins, vec![3, 6, 9]);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_does_not_consume_attempts() {
        let calls = AtomicU32::new(0);
        let result = retry(&SINGLE_BLOCK_POLICY, |timeout| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(TeeError::Busy("is being fully calculated".to_string()))
                } else {
                    Ok(timeout)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // busy retries keep the base deadline
        assert_eq!(result, SINGLE_BLOCK_POLICY.base);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_grows_then_gives_up() {
        let seen = std::sync::Mutex::new(Vec::new());
        let err = retry(&SINGLE_BLOCK_POLICY, |timeout| {
            seen.lock().unwrap().push(timeout);
            async move { Err::<(), _>(TeeError::DeadlineExceeded("slow".to_string())) }
        })
        .await
        .unwrap_err();
        assert!(err.is_deadline());
        assert_eq!(seen.lock().unwrap().clone(), SINGLE_BLOCK_POLICY.timeouts());
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_errors_do_not_retry() {
        let calls = AtomicU32::new(0);
        let err = retry(&TOTAL_POLICY, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), _>(TeeError::Status("invalid proof".to_string())) }
        })
        .await
        .unwrap_err();
        assert!(!err.is_deadline() && !err.is_busy());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
