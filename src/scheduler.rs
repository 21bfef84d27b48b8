use crate::accounts::Account;
use crate::config::{settings::jittered, PacingConfig};
use crate::error::UploadError;
use crate::events::{EventSender, Stage, UploadEvent};
use crate::pipeline::UploadPipeline;
use ethers::types::{Address, H256};
use tokio::time::sleep;
use tracing::{error, info};

/// Terminal outcome of one scheduled upload invocation (post-retry).
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Success { tx_hash: H256 },
    Failed { error: String },
}

/// Transient record of one scheduled invocation. Appended once, never
/// reused.
#[derive(Debug, Clone)]
pub struct UploadAttempt {
    pub account: Address,
    pub index_in_account: u32,
    pub global_index: u32,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub accounts: usize,
    pub uploads_per_account: u32,
    pub successful: u32,
    pub failed: u32,
    pub attempts: Vec<UploadAttempt>,
}

/// Iterates the configured accounts in supplied order, running a fixed
/// number of pipeline invocations per account with jittered pacing.
///
/// No invocation outcome affects the schedule: every account always gets
/// its full configured count (no circuit breaking), and totals are
/// accumulated and reported once at the end.
pub struct AccountScheduler {
    uploads_per_account: u32,
    pacing: PacingConfig,
    events: EventSender,
}

impl AccountScheduler {
    pub fn new(uploads_per_account: u32, pacing: PacingConfig, events: EventSender) -> Self {
        Self {
            uploads_per_account,
            pacing,
            events,
        }
    }

    /// Run the full schedule. `pipeline_for` builds the per-account
    /// pipeline (binding the account's signer); a builder failure marks
    /// that account's uploads as failed without aborting the run.
    pub async fn run<F>(&self, accounts: &[Account], mut pipeline_for: F) -> RunSummary
    where
        F: FnMut(&Account) -> Result<UploadPipeline, UploadError>,
    {
        let count = self.uploads_per_account;
        let total_uploads = count * accounts.len() as u32;
        info!(
            "Initiating {} upload(s) across {} account(s) ({} per account)",
            total_uploads,
            accounts.len(),
            count
        );

        let mut successful = 0u32;
        let mut failed = 0u32;
        let mut attempts = Vec::with_capacity(total_uploads as usize);

        for (account_index, account) in accounts.iter().enumerate() {
            let address = account.address();
            info!(
                "Processing account #{} [{:?}]",
                account_index + 1,
                address
            );

            let pipeline = match pipeline_for(account) {
                Ok(pipeline) => Some(pipeline),
                Err(e) => {
                    error!("Failed to set up pipeline for {:?}: {}", address, e);
                    None
                }
            };

            for index_in_account in 1..=count {
                let global_index = account_index as u32 * count + index_in_account;
                self.events.stage_start(
                    Stage::Schedule,
                    format!(
                        "upload {}/{} (account #{}, file #{})",
                        global_index,
                        total_uploads,
                        account_index + 1,
                        index_in_account
                    ),
                );

                let result = match &pipeline {
                    Some(pipeline) => pipeline.run().await,
                    None => Err(UploadError::Submission(
                        "pipeline unavailable for account".to_string(),
                    )),
                };

                match result {
                    Ok(upload) => {
                        successful += 1;
                        attempts.push(UploadAttempt {
                            account: address,
                            index_in_account,
                            global_index,
                            outcome: AttemptOutcome::Success {
                                tx_hash: upload.tx_hash,
                            },
                        });
                        self.events.stage_success(
                            Stage::Schedule,
                            format!("upload {}/{} completed", global_index, total_uploads),
                        );

                        if global_index < total_uploads {
                            let delay = jittered(self.pacing.between_uploads);
                            info!("Waiting {:.1}s before next upload", delay.as_secs_f64());
                            sleep(delay).await;
                        }
                    }
                    Err(e) => {
                        failed += 1;
                        attempts.push(UploadAttempt {
                            account: address,
                            index_in_account,
                            global_index,
                            outcome: AttemptOutcome::Failed {
                                error: e.to_string(),
                            },
                        });
                        self.events.stage_error(
                            Stage::Schedule,
                            format!("upload {}/{} failed: {}", global_index, total_uploads, e),
                        );

                        let delay = jittered(self.pacing.after_failure);
                        info!("Pausing {:.1}s after failure", delay.as_secs_f64());
                        sleep(delay).await;
                    }
                }
            }

            if account_index + 1 < accounts.len() {
                let delay = jittered(self.pacing.between_accounts);
                info!(
                    "Switching to next account in {:.1}s",
                    delay.as_secs_f64()
                );
                sleep(delay).await;
            }
        }

        let summary = RunSummary {
            accounts: accounts.len(),
            uploads_per_account: count,
            successful,
            failed,
            attempts,
        };
        self.events.emit(UploadEvent::RunSummary {
            accounts: summary.accounts,
            uploads_per_account: summary.uploads_per_account,
            successful: summary.successful,
            failed: summary.failed,
        });
        info!(
            "Run complete: {} successful, {} failed",
            summary.successful, summary.failed
        );
        summary
    }
}
