//! Typed wrappers over the TBA endpoints the bot uses.

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;

use super::fetcher::CachingFetcher;
use super::transport::Transport;
use super::types::{
  DistrictRanking, Event, EventOprs, EventPredictions, EventRankings, MatchSimple,
  TeamEventStatus,
};
use crate::cache::CacheStore;
use crate::error::FetchError;

pub const BASE_URL: &str = "https://www.thebluealliance.com/api/v3";

/// TBA API client. Cheap to clone; all clones share one fetcher and thus one
/// cache.
#[derive(Clone)]
pub struct TbaClient {
  fetcher: Arc<CachingFetcher>,
}

impl TbaClient {
  pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn CacheStore>) -> Self {
    Self {
      fetcher: Arc::new(CachingFetcher::new(BASE_URL, transport, store)),
    }
  }

  async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
    let value = self.fetcher.fetch(path).await?;
    Ok(serde_json::from_value(value)?)
  }

  /// Events a team plays in a given year.
  pub async fn team_events_year(&self, team_key: &str, year: i32) -> Result<Vec<Event>, FetchError> {
    self.get(&format!("/team/{team_key}/events/{year}")).await
  }

  /// Every match a team plays in a given year, in simple form.
  pub async fn team_matches_year_simple(
    &self,
    team_key: &str,
    year: i32,
  ) -> Result<Vec<MatchSimple>, FetchError> {
    self.get(&format!("/team/{team_key}/matches/{year}/simple")).await
  }

  /// All matches of an event, in simple form.
  pub async fn event_matches_simple(&self, event_key: &str) -> Result<Vec<MatchSimple>, FetchError> {
    self.get(&format!("/event/{event_key}/matches/simple")).await
  }

  /// Match and ranking predictions for an event.
  pub async fn event_predictions(&self, event_key: &str) -> Result<EventPredictions, FetchError> {
    self.get(&format!("/event/{event_key}/predictions")).await
  }

  /// Current qualification rankings for an event.
  pub async fn event_rankings(&self, event_key: &str) -> Result<EventRankings, FetchError> {
    self.get(&format!("/event/{event_key}/rankings")).await
  }

  /// Offensive power ratings for an event.
  pub async fn event_oprs(&self, event_key: &str) -> Result<EventOprs, FetchError> {
    self.get(&format!("/event/{event_key}/oprs")).await
  }

  /// A team's matches at one event, in simple form.
  pub async fn team_event_matches(
    &self,
    team_key: &str,
    event_key: &str,
  ) -> Result<Vec<MatchSimple>, FetchError> {
    self
      .get(&format!("/team/{team_key}/event/{event_key}/matches/simple"))
      .await
  }

  /// A team's competition status at each of its events in a year, keyed by
  /// event key. Events without a status yet map to `None`.
  pub async fn team_events_statuses(
    &self,
    team_key: &str,
    year: i32,
  ) -> Result<HashMap<String, Option<TeamEventStatus>>, FetchError> {
    self.get(&format!("/team/{team_key}/events/{year}/statuses")).await
  }

  /// District rankings, best first.
  pub async fn district_rankings(
    &self,
    district_key: &str,
  ) -> Result<Vec<DistrictRanking>, FetchError> {
    self.get(&format!("/district/{district_key}/rankings")).await
  }
}
