//! Background analysis worker.
//!
//! The `ai_analyses` row is the job. A request leaves it PROCESSING and wakes
//! the worker; the worker leases the row, calls the reasoning service and
//! writes the outcome back. A lease that runs out (crashed or stalled worker)
//! makes the row claimable again on the next sweep.

use std::sync::Arc;
use std::time::{Duration, Instant};

use shared_types::{estimate_tokens, AnalysisPayload, AnalysisSettings, AppError};
use sqlx::{Pool, Postgres};
use tokio::sync::Notify;
use tracing::Instrument;
use uuid::Uuid;

use crate::analysis::prompt;
use crate::db::AppState;
use crate::reasoning::ReasoningClient;
use crate::repo;

/// Wake-up handle shared between request handlers and the worker.
#[derive(Clone, Default)]
pub struct AnalysisJobs {
    notify: Arc<Notify>,
}

impl AnalysisJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal that a job is waiting. A signal sent while the worker is busy
    /// is kept until it next waits.
    pub fn notify(&self) {
        self.notify.notify_one();
    }

    async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Start the worker loop on the current runtime.
pub fn spawn(state: AppState) -> tokio::task::JoinHandle<()> {
    let owner = format!("worker-{}", Uuid::new_v4());
    tracing::info!(%owner, "starting analysis worker");
    tokio::spawn(run(state, owner))
}

async fn run(state: AppState, owner: String) {
    let settings = state.config.analysis.clone();
    let mut sweep = tokio::time::interval(Duration::from_secs(settings.poll_interval_secs.max(1)));
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = state.jobs.notified() => {}
            _ = sweep.tick() => {}
        }

        // Drain everything claimable before sleeping again.
        loop {
            match process_next(&state.pool, state.reasoner.as_ref(), &settings, &owner).await {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "analysis worker step failed");
                    break;
                }
            }
        }
    }
}

/// Claim and run one job. Returns the analysis id, or `None` when nothing
/// was claimable.
pub async fn process_next(
    pool: &Pool<Postgres>,
    reasoner: &dyn ReasoningClient,
    settings: &AnalysisSettings,
    owner: &str,
) -> Result<Option<Uuid>, AppError> {
    let exhausted = repo::analysis::fail_exhausted(pool, settings.max_attempts).await?;
    if exhausted > 0 {
        tracing::warn!(count = exhausted, "failed analyses whose worker lease expired");
    }

    let Some(job) = repo::analysis::claim_next(pool, owner, settings.lease_secs).await? else {
        return Ok(None);
    };

    let span = tracing::info_span!(
        "analysis_job",
        analysis_id = %job.id,
        case_id = %job.case_id,
        attempt = job.attempts
    );
    let outcome = run_job(pool, reasoner, settings, owner, job.id, job.case_id, job.advocate_id)
        .instrument(span)
        .await;

    match outcome {
        Ok(()) => {}
        Err(message) => {
            tracing::warn!(analysis_id = %job.id, error = %message, "analysis failed");
            if !repo::analysis::fail(pool, job.id, owner, &message).await? {
                tracing::warn!(analysis_id = %job.id, "lease lost before failure was recorded");
            }
        }
    }

    Ok(Some(job.id))
}

/// Build the prompt, call the reasoning service and store the result.
/// An `Err` carries the message recorded on the row.
async fn run_job(
    pool: &Pool<Postgres>,
    reasoner: &dyn ReasoningClient,
    settings: &AnalysisSettings,
    owner: &str,
    analysis_id: Uuid,
    case_id: Uuid,
    advocate_id: Uuid,
) -> Result<(), String> {
    let started = Instant::now();

    let case = repo::case::find_owned(pool, advocate_id, case_id)
        .await
        .map_err(|e| e.message)?
        .ok_or_else(|| "Case not found".to_string())?;

    let mut conn = pool.acquire().await.map_err(|e| e.to_string())?;
    let documents = repo::document::analyzable_for_case(&mut conn, case_id)
        .await
        .map_err(|e| e.message)?;
    drop(conn);

    if documents.is_empty() {
        return Err("No documents with extracted text".to_string());
    }

    let context = prompt::case_context(&case, &documents, settings.context_char_cap);
    let completion = reasoner
        .complete(prompt::ANALYSIS_INSTRUCTION, &context, settings.max_tokens)
        .await
        .map_err(|e| e.to_string())?;

    if let Some(usage) = completion.usage {
        tracing::debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "reasoning usage reported"
        );
    }

    let payload = AnalysisPayload::parse_model_reply(&completion.text)
        .map_err(|e| format!("Invalid analysis reply: {e}"))?;

    let token_count = estimate_tokens(
        context.len() + prompt::ANALYSIS_INSTRUCTION.len() + completion.text.len(),
    );
    let processing_time_seconds = i32::try_from(started.elapsed().as_secs()).unwrap_or(i32::MAX);

    let stored = repo::analysis::complete(
        pool,
        analysis_id,
        owner,
        repo::analysis::CompletedAnalysis {
            payload: &payload,
            model_version: &completion.model,
            processing_time_seconds,
            token_count,
        },
    )
    .await
    .map_err(|e| e.message)?;

    if stored {
        tracing::info!(
            %analysis_id,
            urgency = payload.urgency_level.as_db_str(),
            token_count,
            processing_time_seconds,
            "analysis completed"
        );
    } else {
        tracing::warn!(%analysis_id, "lease lost before result was stored");
    }
    Ok(())
}
