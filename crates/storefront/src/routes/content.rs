//! CMS-backed endpoints: events and homepage settings.
//!
//! All of these degrade to empty content when Sanity is unconfigured or failing.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use crate::content::events::{self, EventItem, EventsSplit};
use crate::content::home::{self, HomeSettings};
use crate::state::AppState;

const DEFAULT_UPCOMING_LIMIT: usize = 3;

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub limit: Option<usize>,
}

/// `GET /api/events`
#[instrument(skip(state))]
pub async fn list_events(State(state): State<AppState>) -> Json<Vec<EventItem>> {
    Json(events::load_events(state.sanity()).await)
}

/// `GET /api/events/upcoming?limit=`
#[instrument(skip(state))]
pub async fn upcoming_events(
    State(state): State<AppState>,
    Query(query): Query<UpcomingQuery>,
) -> Json<Vec<EventItem>> {
    let all = events::load_events(state.sanity()).await;
    let limit = query.limit.unwrap_or(DEFAULT_UPCOMING_LIMIT);
    Json(events::upcoming_events(all, events::today(), limit))
}

/// `GET /api/events/split`
#[instrument(skip(state))]
pub async fn split_events(State(state): State<AppState>) -> Json<EventsSplit> {
    let all = events::load_events(state.sanity()).await;
    Json(events::split_events(all, events::today()))
}

/// `GET /api/home`
#[instrument(skip(state))]
pub async fn home_settings(State(state): State<AppState>) -> Json<HomeSettings> {
    Json(home::load_home_settings(state.sanity()).await)
}
