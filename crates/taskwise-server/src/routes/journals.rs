//! The caller's own journal. Every query is scoped to the authenticated
//! user; other users' notes read as missing.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::NaiveDate;

use taskwise_core::journal::{
    month_bounds, CreateJournalNote, JournalDaySummary, UpdateJournalNote, UpdateMood,
};
use taskwise_core::resource::{Envelope, JournalDayResource, JournalNoteResource};
use taskwise_core::{User, ValidationError};

use super::AppState;
use crate::error::{ApiJson, ApiPath, ApiResult};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/journals/month/{year}/{month}", get(month))
        .route("/v1/journals/day/{date}", get(day))
        .route("/v1/journals/mood", post(update_mood))
        .route("/v1/journals/notes", post(create_note))
        .route(
            "/v1/journals/notes/{id}",
            put(update_note).delete(delete_note),
        )
}

async fn day_resource(state: &AppState, user_id: i64, date: NaiveDate) -> ApiResult<JournalDayResource> {
    let entry = state.db.get_journal_entry(user_id, date).await?;
    let notes = match entry {
        Some(ref e) => state.db.list_journal_notes(e.id).await?,
        None => Vec::new(),
    };
    Ok(JournalDayResource::new(date, entry.as_ref(), &notes))
}

async fn month(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiPath((year, month)): ApiPath<(i32, u32)>,
) -> ApiResult<Json<Envelope<Vec<JournalDaySummary>>>> {
    let (first, last) = month_bounds(year, month)
        .ok_or_else(|| ValidationError::new("month", "must be between 1 and 12"))?;
    let days = state.db.journal_month(user.id, first, last).await?;
    Ok(Json(Envelope::new(days)))
}

async fn day(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiPath(date): ApiPath<NaiveDate>,
) -> ApiResult<Json<Envelope<JournalDayResource>>> {
    Ok(Json(Envelope::new(day_resource(&state, user.id, date).await?)))
}

async fn update_mood(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiJson(input): ApiJson<UpdateMood>,
) -> ApiResult<Json<Envelope<JournalDayResource>>> {
    state
        .db
        .set_journal_mood(user.id, input.entry_date, input.mood)
        .await?;
    Ok(Json(Envelope::new(
        day_resource(&state, user.id, input.entry_date).await?,
    )))
}

async fn create_note(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiJson(input): ApiJson<CreateJournalNote>,
) -> ApiResult<(StatusCode, Json<Envelope<JournalNoteResource>>)> {
    input.validate()?;
    let note = state.db.create_journal_note(user.id, &input).await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::new(JournalNoteResource::from(&note))),
    ))
}

async fn update_note(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<UpdateJournalNote>,
) -> ApiResult<Json<Envelope<JournalNoteResource>>> {
    input.validate()?;
    let note = state.db.update_journal_note(user.id, id, &input).await?;
    Ok(Json(Envelope::new(JournalNoteResource::from(&note))))
}

async fn delete_note(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    state.db.delete_journal_note(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
