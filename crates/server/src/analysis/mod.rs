//! Case analysis and document chat on top of the reasoning service.

pub mod prompt;
pub mod worker;

use shared_types::{
    estimate_tokens, AiAnalysis, AiAnalysisResponse, AppError, ChatRequest, ChatResponse,
};
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::db::AppState;
use crate::error_convert::SqlxErrorExt;
use crate::repo;

/// Queue an analysis of a visible owned case and wake the worker.
///
/// The returned row is PROCESSING. A case without any extracted document text
/// is rejected before anything is written; a case whose analysis is already
/// running is a conflict. Retrying a finished or failed analysis goes through
/// here as well.
#[tracing::instrument(skip(state))]
pub async fn request(
    state: &AppState,
    advocate_id: Uuid,
    case_id: Uuid,
) -> Result<AiAnalysisResponse, AppError> {
    let mut tx = state.pool.begin().await.map_err(SqlxErrorExt::into_app_error)?;
    let queued = queue_in(&mut tx, state, advocate_id, case_id)
        .await
        .and_then(|row| {
            row.ok_or_else(|| AppError::conflict("Analysis is already in progress for this case"))
        });
    // The upsert locks the existing row even when its WHERE rejects it, so
    // release the lock now instead of when the connection is next used.
    let row = match queued {
        Ok(row) => row,
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, "analysis request rollback failed");
            }
            return Err(e);
        }
    };

    tx.commit().await.map_err(SqlxErrorExt::into_app_error)?;
    state.jobs.notify();

    tracing::info!(analysis_id = %row.id, retry_count = row.retry_count, "analysis queued");
    to_response(row)
}

async fn queue_in(
    conn: &mut PgConnection,
    state: &AppState,
    advocate_id: Uuid,
    case_id: Uuid,
) -> Result<Option<AiAnalysis>, AppError> {
    repo::case::lock_visible(conn, advocate_id, case_id).await?;

    let documents = repo::document::analyzable_for_case(conn, case_id).await?;
    if documents.is_empty() {
        return Err(AppError::invalid_field(
            "documents",
            "Case has no documents with extracted text to analyze",
        ));
    }

    repo::analysis::request(conn, case_id, advocate_id, state.reasoner.model()).await
}

/// Current analysis of a case owned by the caller.
pub async fn get(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    case_id: Uuid,
) -> Result<AiAnalysisResponse, AppError> {
    repo::case::find_owned(pool, advocate_id, case_id)
        .await?
        .ok_or_else(|| AppError::not_found("Case not found"))?;

    let row = repo::analysis::find_for_case(pool, case_id)
        .await?
        .ok_or_else(|| AppError::not_found("Analysis not found"))?;
    to_response(row)
}

/// Analysis of a case for embedding in the case detail, if there is one.
pub async fn find_for_case(
    pool: &Pool<Postgres>,
    case_id: Uuid,
) -> Result<Option<AiAnalysisResponse>, AppError> {
    repo::analysis::find_for_case(pool, case_id)
        .await?
        .map(to_response)
        .transpose()
}

pub async fn delete(pool: &Pool<Postgres>, advocate_id: Uuid, case_id: Uuid) -> Result<(), AppError> {
    repo::case::find_visible(pool, advocate_id, case_id)
        .await?
        .ok_or_else(|| AppError::not_found("Case not found"))?;

    if !repo::analysis::delete_for_case(pool, case_id).await? {
        return Err(AppError::not_found("Analysis not found"));
    }
    Ok(())
}

/// Answer a question about one document's extracted text.
#[tracing::instrument(skip(state, req), fields(history = req.history.len()))]
pub async fn chat(
    state: &AppState,
    advocate_id: Uuid,
    document_id: Uuid,
    req: &ChatRequest,
) -> Result<ChatResponse, AppError> {
    let doc = repo::document::find_visible(&state.pool, advocate_id, document_id)
        .await?
        .ok_or_else(|| AppError::not_found("Document not found"))?;

    if !doc.has_extracted_text() {
        return Err(AppError::invalid_field(
            "documentId",
            "Document has no extracted text to chat about",
        ));
    }

    let case = repo::case::find_visible(&state.pool, advocate_id, doc.case_id)
        .await?
        .ok_or_else(|| AppError::not_found("Case not found"))?;

    let settings = &state.config.analysis;
    let context = prompt::chat_context(&doc, &case, settings.chat_context_char_cap);
    let transcript = prompt::chat_transcript(&req.history, &req.message);

    let completion = state
        .reasoner
        .complete(&transcript, &context, settings.chat_max_tokens)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "document chat failed");
            AppError::external(format!("Reasoning service error: {e}"))
        })?;

    let token_count = estimate_tokens(context.len() + transcript.len() + completion.text.len());

    Ok(ChatResponse {
        response: completion.text,
        document_title: doc.title,
        model: completion.model,
        token_count,
    })
}

fn to_response(row: AiAnalysis) -> Result<AiAnalysisResponse, AppError> {
    let id = row.id;
    AiAnalysisResponse::try_from(row).map_err(|e| {
        tracing::error!(analysis_id = %id, error = %e, "stored analysis payload is unreadable");
        AppError::internal("Stored analysis could not be read")
    })
}
