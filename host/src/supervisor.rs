//! Long-lived scheduler. Owns the minute and hour ticks, polls the chain for
//! open challenges, and keeps exactly one instance of each background
//! activity running. Every activity runs under a panic guard; a panicked
//! task is logged to the panic sink and its slot freed for the next tick.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::error::HostResult;
use crate::idle::IdleChallengeParams;
use crate::service::ServiceChallengeParams;
use crate::sink::PanicSink;
use crate::Node;

const MINUTE_TICK: Duration = Duration::from_secs(60);
const HOUR_TICK: Duration = Duration::from_secs(3600);

pub struct Supervisor {
    node: Arc<Node>,
    panic_sink: Arc<PanicSink>,
    idle_slot: Arc<Semaphore>,
    service_slot: Arc<Semaphore>,
    report_slot: Arc<Semaphore>,
    discover_slot: Arc<Semaphore>,
    logs_slot: Arc<Semaphore>,
}

impl Supervisor {
    pub fn new(node: Arc<Node>, panic_sink: Arc<PanicSink>) -> Self {
        Self {
            node,
            panic_sink,
            idle_slot: Arc::new(Semaphore::new(1)),
            service_slot: Arc::new(Semaphore::new(1)),
            report_slot: Arc::new(Semaphore::new(1)),
            discover_slot: Arc::new(Semaphore::new(1)),
            logs_slot: Arc::new(Semaphore::new(1)),
        }
    }

    pub async fn run(&self) {
        info!("supervisor started");
        let mut minute = interval(MINUTE_TICK);
        minute.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut hour = interval(HOUR_TICK);
        hour.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = minute.tick() => {
                    self.poll_challenges().await;
                    let node = self.node.clone();
                    self.spawn_guarded("report", &self.report_slot, async move {
                        node.report_files().await
                    });
                }
                _ = hour.tick() => {
                    let node = self.node.clone();
                    self.spawn_guarded("discover", &self.discover_slot, async move {
                        node.refresh_peers().await
                    });
                    let node = self.node.clone();
                    self.spawn_guarded("logs", &self.logs_slot, async move {
                        node.report_logs().await
                    });
                }
            }
        }
    }

    async fn poll_challenges(&self) {
        let node = &self.node;
        let latest_block = match node.chain.block_height().await {
            Ok(height) => height,
            Err(e) => {
                warn!("block height: {e}");
                return;
            }
        };
        let chall = match node.chain.query_challenge_info(&node.signer.public_key()).await {
            Ok(chall) => chall,
            Err(e) if e.is_empty() => return,
            Err(e) => {
                warn!("challenge info: {e}");
                return;
            }
        };
        let elem = &chall.challenge;
        if elem.verify_expiration <= latest_block {
            return;
        }

        let idle_params = IdleChallengeParams {
            latest_block,
            start: elem.start,
            verify_expiration: elem.verify_expiration,
            front: elem.miner_snapshot.space_proof_info.front,
            rear: elem.miner_snapshot.space_proof_info.rear,
            space_param: elem.space_param.clone(),
            accumulator: elem.miner_snapshot.space_proof_info.accumulator.clone(),
            tee_sign: elem.miner_snapshot.tee_signature.clone(),
            allocated_tee: chall
                .prove_info
                .idle_prove
                .as_ref()
                .map(|a| a.tee_pubkey)
                .unwrap_or([0u8; 32]),
            proof_submitted: chall.prove_info.idle_prove.is_some(),
        };
        let n = node.clone();
        self.spawn_guarded("ichal", &self.idle_slot, async move {
            n.run_idle_challenge(idle_params).await
        });

        if !node.is_service_challenging() {
            let service_params = ServiceChallengeParams {
                latest_block,
                start: elem.start,
                verify_expiration: elem.verify_expiration,
                random_index_list: elem.random_index_list.clone(),
                random_list: elem.random_list.clone(),
            };
            let n = node.clone();
            self.spawn_guarded("schal", &self.service_slot, async move {
                n.run_service_challenge(service_params).await
            });
        }
    }

    /// Run `fut` in the background if the activity's slot is free. The slot
    /// is released when the task finishes, however it finishes.
    fn spawn_guarded(
        &self,
        name: &'static str,
        slot: &Arc<Semaphore>,
        fut: impl Future<Output = HostResult<()>> + Send + 'static,
    ) {
        let Ok(permit) = slot.clone().try_acquire_owned() else {
            return;
        };
        let sink = self.panic_sink.clone();
        tokio::spawn(async move {
            let _permit = permit;
            match tokio::spawn(fut).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("{name}: {e}"),
                Err(e) if e.is_panic() => {
                    sink.record(name, &e);
                    warn!("{name} panicked; slot freed for the next tick");
                }
                Err(_) => {}
            }
        });
    }
}
