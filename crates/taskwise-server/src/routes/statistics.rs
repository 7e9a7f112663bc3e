use axum::{extract::State, routing::get, Extension, Json, Router};
use chrono::Utc;

use taskwise_core::resource::Envelope;
use taskwise_core::statistics::{Statistics, StatisticsQuery};
use taskwise_core::{User, ValidationError};

use super::AppState;
use crate::error::{ApiError, ApiQuery, ApiResult};

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/statistics", get(statistics))
}

/// Task counts over tasks created in `[start_date, end_date]`, optionally
/// narrowed to one assignee. Employees always get their own numbers.
async fn statistics(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiQuery(mut query): ApiQuery<StatisticsQuery>,
) -> ApiResult<Json<Envelope<Statistics>>> {
    if !user.is_admin() {
        match query.user_id {
            Some(id) if id != user.id => {
                return Err(ApiError::Forbidden(
                    "employees can only view their own statistics".into(),
                ))
            }
            _ => query.user_id = Some(user.id),
        }
    }
    if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
        if start > end {
            return Err(ValidationError::new("start_date", "must not be after end_date").into());
        }
    }

    let tasks = state.db.list_tasks(&query.to_filter()).await?;
    let today = Utc::now().date_naive();
    Ok(Json(Envelope::new(Statistics::from_tasks(&tasks, today))))
}
