//! Fragment-report task. Moves fully-downloaded files from the staging dir
//! into service once the chain records them, and reports completed transfer
//! tasks the chain has not seen yet.

use std::fs;
use std::io;
use std::path::Path;

use ceres_lib::consts::FRAGMENT_SIZE;
use tracing::{info, warn};

use crate::error::HostResult;
use crate::workspace::Workspace;
use crate::Node;

impl Node {
    pub async fn report_files(&self) -> HostResult<()> {
        let tmp = self.workspace.tmp_dir();
        for dir in Workspace::subdirs(&tmp)? {
            let fid = dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();

            match self.chain.query_file_metadata(&fid).await {
                Ok(_) => {
                    // recorded on chain; promote into the service dir
                    move_dir_files(&dir, &self.workspace.file_dir().join(&fid))?;
                    info!("promoted {fid} into the service dir");
                    continue;
                }
                Err(e) if e.is_empty() => {}
                Err(e) => return Err(e.into()),
            }

            let order = match self.chain.query_storage_order(&fid).await {
                Ok(order) => order,
                Err(e) if e.is_empty() => {
                    warn!("storage order for {fid} is gone");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let miner = self.signer.public_key();
            if order.complete_list.iter().any(|c| c.miner == miner) {
                continue;
            }

            let Some(task) = order
                .miner_task_list
                .iter()
                .find(|t| t.miner.is_none() || t.miner == Some(miner))
            else {
                continue;
            };
            let all_present = task.fragment_list.iter().all(|fragment| {
                fs::metadata(dir.join(fragment))
                    .map(|m| m.len() == FRAGMENT_SIZE)
                    .unwrap_or(false)
            });
            if !all_present {
                continue;
            }

            info!("will report {fid}");
            match self.chain.report_file(task.index, &fid).await {
                Ok(tx) => info!("report file [{fid}] suc: {tx}"),
                Err(e) => warn!("report file [{fid}]: {e}"),
            }
        }
        Ok(())
    }
}

/// Move every entry of `old` into `new`, creating `new` as needed. The
/// source dir is removed once empty.
fn move_dir_files(old: &Path, new: &Path) -> io::Result<()> {
    fs::create_dir_all(new)?;
    for entry in fs::read_dir(old)? {
        let entry = entry?;
        fs::rename(entry.path(), new.join(entry.file_name()))?;
    }
    let _ = fs::remove_dir(old);
    Ok(())
}
