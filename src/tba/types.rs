//! Serde models for the TBA API v3 payloads the bot renders.
//!
//! Only the fields the formatting layer reads are modeled; everything else
//! in the upstream JSON is ignored on deserialization.

use serde::Deserialize;
use std::collections::HashMap;

/// An FRC event, from `/team/{key}/events/{year}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
  pub key: String,
  pub name: String,
  /// `YYYY-MM-DD`
  pub start_date: String,
  /// `YYYY-MM-DD`
  pub end_date: String,
  pub week: Option<i32>,
  pub location_name: Option<String>,
}

/// Competition level of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompLevel {
  /// Qualification
  Qm,
  /// Octofinal (legacy brackets)
  Ef,
  /// Quarterfinal (legacy brackets)
  Qf,
  /// "Semifinal": every double-elimination round before the grand finals
  Sf,
  /// Finals
  F,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchAlliance {
  /// -1 until the match has been played.
  pub score: Option<i64>,
  pub team_keys: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchAlliances {
  pub red: MatchAlliance,
  pub blue: MatchAlliance,
}

/// A match in its "simple" upstream form.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchSimple {
  pub key: String,
  pub comp_level: CompLevel,
  pub set_number: i64,
  pub match_number: i64,
  pub alliances: Option<MatchAlliances>,
  /// `"red"`, `"blue"`, or `""` while undecided.
  pub winning_alliance: Option<String>,
  pub event_key: String,
  /// Unix timestamp of the scheduled or rescheduled start.
  pub predicted_time: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlliancePrediction {
  pub score: f64,
}

/// Predicted outcome for a single match.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchPrediction {
  pub red: AlliancePrediction,
  pub blue: AlliancePrediction,
  pub winning_alliance: Option<String>,
}

/// Match predictions keyed by match key, split by phase.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchPredictions {
  #[serde(default)]
  pub qual: HashMap<String, MatchPrediction>,
  #[serde(default)]
  pub playoff: HashMap<String, MatchPrediction>,
}

/// `(team_key, stats)` pair from the ranking prediction list.
#[derive(Debug, Clone, Deserialize)]
pub struct RankingPrediction(pub String, pub Vec<f64>);

impl RankingPrediction {
  pub fn team_key(&self) -> &str {
    &self.0
  }

  /// Predicted ranking points sit at a fixed position in the stats vector.
  pub fn ranking_points(&self) -> Option<f64> {
    self.1.get(4).copied()
  }
}

/// From `/event/{key}/predictions`. Upstream marks this endpoint as subject
/// to change, hence everything optional.
#[derive(Debug, Clone, Deserialize)]
pub struct EventPredictions {
  pub match_predictions: Option<MatchPredictions>,
  pub ranking_predictions: Option<Vec<RankingPrediction>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WinLossRecord {
  pub wins: i64,
  pub losses: i64,
  pub ties: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamRanking {
  pub rank: i64,
  pub team_key: String,
  pub matches_played: i64,
  pub record: Option<WinLossRecord>,
}

/// From `/event/{key}/rankings`.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRankings {
  #[serde(default)]
  pub rankings: Vec<TeamRanking>,
}

/// From `/event/{key}/oprs`: offensive power ratings keyed by team key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventOprs {
  #[serde(default)]
  pub oprs: HashMap<String, f64>,
}

/// One row of `/district/{key}/rankings`.
#[derive(Debug, Clone, Deserialize)]
pub struct DistrictRanking {
  pub rank: i64,
  pub team_key: String,
  pub point_total: i64,
}

/// A team's standing at one event, from `/team/{key}/events/{year}/statuses`.
/// The overall status string carries the `<b>` markup TBA renders with.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamEventStatus {
  pub overall_status_str: Option<String>,
}
