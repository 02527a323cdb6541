//! Hourly housekeeping: refresh the peer table from the gateway and upload
//! the rotating logs. Both tasks jitter their start so a fleet of miners
//! does not stampede the gateway on the hour.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use crate::error::{HostError, HostResult};
use crate::Node;

const PEER_JITTER_SECS: u64 = 120;
const LOG_JITTER_SECS: u64 = 300;

impl Node {
    pub async fn refresh_peers(&self) -> HostResult<()> {
        let jitter = rand::thread_rng().gen_range(0..PEER_JITTER_SECS);
        tokio::time::sleep(Duration::from_secs(jitter)).await;

        let peers: HashMap<String, String> = self
            .http
            .get(self.config.gateway_url.clone())
            .send()
            .await?
            .json()
            .await?;

        {
            let mut table = self.peers.write().await;
            *table = peers.clone();
        }

        let buf = serde_json::to_vec(&peers)?;
        tokio::fs::write(self.workspace.peers_path(), buf).await?;
        info!("updated {} peers", peers.len());
        Ok(())
    }

    /// Upload every `*.log` under the workspace log dir to the feedback
    /// endpoint. Upload failures are logged and skipped; the next hour tick
    /// tries again.
    pub async fn report_logs(&self) -> HostResult<()> {
        let jitter = rand::thread_rng().gen_range(0..LOG_JITTER_SECS);
        tokio::time::sleep(Duration::from_secs(jitter)).await;

        let mut entries = tokio::fs::read_dir(self.workspace.log_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("log") {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Ok(data) = tokio::fs::read(&path).await else {
                continue;
            };

            let part = reqwest::multipart::Part::bytes(data).file_name(name.clone());
            let form = reqwest::multipart::Form::new().part("file", part);
            let result = self
                .http
                .post(self.config.feedback_url.clone())
                .header("Account", self.signer.account())
                .multipart(form)
                .send()
                .await;
            if let Err(e) = result {
                warn!("uploading {name}: {e}");
            }
        }
        Ok(())
    }
}

impl From<reqwest::Error> for HostError {
    fn from(e: reqwest::Error) -> Self {
        HostError::Http(e.to_string())
    }
}
