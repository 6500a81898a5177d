use std::sync::Arc;

use tracing::debug;

use crate::client::JobServerClient;
use crate::error::ControlError;
use crate::store::FailureLedger;

/// User-initiated queue and job actions.
///
/// Unlike the passive poll cycle, these propagate their errors to the
/// caller so the initiating action can show a failure. Each one
/// invalidates the next snapshot on the server side; the next cycle picks
/// that up.
#[derive(Clone)]
pub struct QueueControls {
    client: Arc<JobServerClient>,
    ledger: FailureLedger,
}

impl QueueControls {
    pub fn new(client: Arc<JobServerClient>, ledger: FailureLedger) -> Self {
        Self { client, ledger }
    }

    pub async fn pause_queue(&self, queue_name: &str) -> Result<(), ControlError> {
        let queue_name = validated("queue name", queue_name)?;
        self.client.pause_queue(queue_name).await?;
        Ok(())
    }

    pub async fn resume_queue(&self, queue_name: &str) -> Result<(), ControlError> {
        let queue_name = validated("queue name", queue_name)?;
        self.client.resume_queue(queue_name).await?;
        Ok(())
    }

    /// Retry a failed job; on success the ledger's retry count for that
    /// job moves up.
    pub async fn retry_job(&self, job_id: &str) -> Result<(), ControlError> {
        let job_id = validated("job id", job_id)?;
        self.client.retry_job(job_id).await?;

        let known = self.ledger.increment_retry_count(job_id).await?;
        if !known {
            debug!(job_id, "retried a job with no ledger record");
        }
        Ok(())
    }

    pub async fn cancel_job(&self, job_id: &str) -> Result<(), ControlError> {
        let job_id = validated("job id", job_id)?;
        self.client.cancel_job(job_id).await?;
        Ok(())
    }
}

/// Reject values that would mangle the request path.
fn validated<'a>(what: &str, value: &'a str) -> Result<&'a str, ControlError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ControlError::Input(format!("{what} must not be empty")));
    }
    if value.contains('/') || value.contains(char::is_whitespace) {
        return Err(ControlError::Input(format!("{what} contains invalid characters: {value}")));
    }
    Ok(value)
}
