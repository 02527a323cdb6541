use std::time::Duration;

/// Length of the per-challenge random parameter vector for space proofs.
pub const SPACE_CHALLENGE_PARAM_LEN: usize = 8;

/// Length of a TEE worker public key.
pub const WORKER_PUBLIC_KEY_LEN: usize = 32;

/// Maximum length of a TEE signature accepted by the chain.
pub const TEE_SIG_LEN: usize = 256;

/// Length of the idle-set accumulator commitment.
pub const ACC_LEN: usize = 256;

/// Maximum number of 64-bit words in a service bloom filter.
pub const BLOOM_FILTER_LEN: usize = 256;

/// Number of fragments shipped to the TEE per batch-verify call.
pub const BATCH_SIZE: usize = 5000;

/// Size of a service fragment on disk.
pub const FRAGMENT_SIZE: u64 = 8 * 1024 * 1024;

/// Target block production interval of the chain.
pub const BLOCK_INTERVAL: Duration = Duration::from_secs(6);

/// Upper bound on the wait for a single per-fragment proof computation.
pub const GEN_PROOF_TIMEOUT: Duration = Duration::from_secs(180);
