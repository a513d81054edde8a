//! Submission API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use contentgate_core::{IntakeError, Submission, SubmissionFilter, SubmissionStatus};

use crate::state::AppState;

/// Maximum allowed limit for submission queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for submission queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a submission
#[derive(Debug, Deserialize)]
pub struct CreateSubmissionBody {
    pub content: String,
}

/// Query parameters for listing submissions
#[derive(Debug, Deserialize)]
pub struct ListSubmissionsParams {
    /// Filter by status (case-insensitive)
    pub status: Option<String>,
    /// Maximum number of submissions to return
    pub limit: Option<i64>,
    /// Pagination offset
    pub offset: Option<i64>,
}

/// Response for submission operations
#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub id: String,
    pub content: String,
    pub status: SubmissionStatus,
    pub created_at: String,
    pub processing_started_at: Option<String>,
    pub processed_at: Option<String>,
}

impl From<Submission> for SubmissionResponse {
    fn from(submission: Submission) -> Self {
        Self {
            id: submission.id,
            content: submission.content,
            status: submission.status,
            created_at: submission.created_at.to_rfc3339(),
            processing_started_at: submission.processing_started_at.map(|t| t.to_rfc3339()),
            processed_at: submission.processed_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Response for listing submissions
#[derive(Debug, Serialize)]
pub struct ListSubmissionsResponse {
    pub submissions: Vec<SubmissionResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new submission and hand it to the transport
pub async fn create_submission(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateSubmissionBody>,
) -> Result<(StatusCode, Json<SubmissionResponse>), impl IntoResponse> {
    match state.submissions().create(&body.content).await {
        Ok(submission) => Ok((StatusCode::CREATED, Json(SubmissionResponse::from(submission)))),
        Err(e @ IntakeError::EmptyContent) => {
            Err(error_response(StatusCode::UNPROCESSABLE_ENTITY, e))
        }
        Err(e) => Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e)),
    }
}

/// Get a submission by ID
pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SubmissionResponse>, impl IntoResponse> {
    match state.submissions().get(&id) {
        Ok(Some(submission)) => Ok(Json(SubmissionResponse::from(submission))),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Submission not found: {}", id),
        )),
        Err(e) => Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e)),
    }
}

/// List submissions, newest first
pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListSubmissionsParams>,
) -> Result<Json<ListSubmissionsResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = SubmissionFilter::new().with_limit(limit).with_offset(offset);

    if let Some(ref status) = params.status {
        match status.parse::<SubmissionStatus>() {
            Ok(status) => filter = filter.with_status(status),
            Err(e) => return Err(error_response(StatusCode::UNPROCESSABLE_ENTITY, e)),
        }
    }

    let submissions = match state.submissions().list(&filter) {
        Ok(submissions) => submissions,
        Err(e) => return Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e)),
    };

    // Total ignores pagination
    let total = match state.submissions().count(&filter) {
        Ok(total) => total,
        Err(e) => return Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e)),
    };

    Ok(Json(ListSubmissionsResponse {
        submissions: submissions.into_iter().map(SubmissionResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}
