//! `/frc` command handlers: fetch TBA data, shape it, and page it.
//!
//! Handlers never talk to Discord directly. Each returns a [`CommandReply`]
//! holding the first embed and, for multi-page results, a live pager whose
//! render function closes over the precomputed items.

use std::cmp::Ordering;

use chrono::{Datelike, Local, Utc};
use color_eyre::Result;
use twilight_model::channel::message::Embed;

use super::format;
use crate::error::FetchError;
use crate::pager::{Pager, RenderFn};
use crate::tba::types::{CompLevel, MatchSimple, RankingPrediction};
use crate::tba::TbaClient;

const PREDICTIONS_PER_PAGE: usize = 20;
const RANKINGS_PER_PAGE: usize = 16;

/// A handler's reply: the page to show now, plus the pager when there is
/// more than one page.
pub struct CommandReply {
  pub embed: Embed,
  pub pager: Option<Pager<Embed>>,
}

impl CommandReply {
  fn single(embed: Embed) -> Self {
    Self { embed, pager: None }
  }

  fn paged(render: RenderFn<Embed>, page_count: usize) -> Result<Self> {
    let pager = Pager::new(0, page_count, render)?;
    let embed = pager.current()?;
    let pager = (pager.page_count() > 1).then_some(pager);
    Ok(Self { embed, pager })
  }
}

pub struct CommandHandler {
  tba: TbaClient,
  home_team: u32,
  matches_per_page: usize,
}

impl CommandHandler {
  pub fn new(tba: TbaClient, home_team: u32, matches_per_page: usize) -> Self {
    Self {
      tba,
      home_team,
      matches_per_page,
    }
  }

  fn team(&self, team: Option<u32>) -> u32 {
    team.unwrap_or(self.home_team)
  }

  /// Events played by a team this season.
  pub async fn events(&self, team: Option<u32>) -> Result<CommandReply> {
    let team = self.team(team);
    let events = self
      .tba
      .team_events_year(&format!("frc{team}"), Local::now().year())
      .await?;

    Ok(CommandReply::single(format::format_events(&events, team)))
  }

  /// Upcoming matches for a team, with score predictions overlaid when the
  /// current event has them.
  pub async fn schedule(&self, team: Option<u32>) -> Result<CommandReply> {
    let team = self.team(team);
    let matches = self
      .tba
      .team_matches_year_simple(&format!("frc{team}"), Local::now().year())
      .await?;

    let now = Utc::now().timestamp();
    let mut upcoming: Vec<MatchSimple> = matches
      .into_iter()
      .filter(|m| m.predicted_time.is_some_and(|t| t > now))
      .collect();
    upcoming.sort_by_key(|m| m.predicted_time);

    if upcoming.is_empty() {
      return Ok(CommandReply::single(format::notice(
        "Upcoming Matches",
        "No scheduled matches.",
      )));
    }

    // Predictions exist only for the event currently being played.
    let current_event = upcoming[0].event_key.clone();
    let predictions = match self.tba.event_predictions(&current_event).await {
      Ok(p) => p.match_predictions,
      Err(FetchError::NotFound) => None,
      Err(e) => return Err(e.into()),
    };

    let per_page = self.matches_per_page;
    let page_count = upcoming.len().div_ceil(per_page);
    let render: RenderFn<Embed> = Box::new(move |page| {
      let end = ((page + 1) * per_page).min(upcoming.len());
      Ok(format::format_matches(
        &upcoming[page * per_page..end],
        &format!("Upcoming Matches - {} - Page {}/{}", team, page + 1, page_count),
        team,
        predictions.as_ref(),
      ))
    });

    CommandReply::paged(render, page_count)
  }

  /// Past matches for a team, most recent first.
  pub async fn history(&self, team: Option<u32>) -> Result<CommandReply> {
    let team = self.team(team);
    let matches = self
      .tba
      .team_matches_year_simple(&format!("frc{team}"), Local::now().year())
      .await?;

    let now = Utc::now().timestamp();
    let mut previous: Vec<MatchSimple> = matches
      .into_iter()
      .filter(|m| m.predicted_time.is_some_and(|t| t < now))
      .collect();
    previous.sort_by_key(|m| std::cmp::Reverse(m.predicted_time));

    if previous.is_empty() {
      return Ok(CommandReply::single(format::notice(
        "Previous Matches",
        "No matches played yet.",
      )));
    }

    let per_page = self.matches_per_page;
    let page_count = previous.len().div_ceil(per_page);
    let render: RenderFn<Embed> = Box::new(move |page| {
      let end = ((page + 1) * per_page).min(previous.len());
      Ok(format::format_matches(
        &previous[page * per_page..end],
        &format!("Previous Matches - {} - Page {}/{}", team, page + 1, page_count),
        team,
        None,
      ))
    });

    CommandReply::paged(render, page_count)
  }

  /// A team's matches at a specific event, in schedule order.
  pub async fn matches(&self, event_key: &str, team: Option<u32>) -> Result<CommandReply> {
    let team = self.team(team);
    let mut matches = self
      .tba
      .team_event_matches(&format!("frc{team}"), event_key)
      .await?;
    matches.sort_by_key(|m| m.predicted_time);

    if matches.is_empty() {
      return Ok(CommandReply::single(format::notice(
        "Matches",
        "No matches found.",
      )));
    }

    let per_page = self.matches_per_page;
    let page_count = matches.len().div_ceil(per_page);
    let event_key = event_key.to_string();
    let render: RenderFn<Embed> = Box::new(move |page| {
      let end = ((page + 1) * per_page).min(matches.len());
      Ok(format::format_matches(
        &matches[page * per_page..end],
        &format!(
          "Matches - {} at {} - Page {}/{}",
          team,
          event_key,
          page + 1,
          page_count
        ),
        team,
        None,
      ))
    });

    CommandReply::paged(render, page_count)
  }

  /// Where a team stands at each of its events this season.
  pub async fn status(&self, team: Option<u32>) -> Result<CommandReply> {
    let team = self.team(team);
    let statuses = self
      .tba
      .team_events_statuses(&format!("frc{team}"), Local::now().year())
      .await?;

    if statuses.is_empty() {
      return Ok(CommandReply::single(format::notice(
        "Event Status",
        "No events this season.",
      )));
    }

    // A team plays a handful of events a year; one embed is enough.
    let mut rows: Vec<(String, Option<String>)> = statuses
      .into_iter()
      .map(|(event_key, status)| (event_key, status.and_then(|s| s.overall_status_str)))
      .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(CommandReply::single(format::format_statuses(
      &rows,
      &format!("Event Status - {team}"),
    )))
  }

  /// District championship points race.
  pub async fn district(&self, district_key: &str) -> Result<CommandReply> {
    let rankings = self.tba.district_rankings(district_key).await?;
    if rankings.is_empty() {
      return Ok(CommandReply::single(format::notice(
        "District Rankings",
        "No rankings available.",
      )));
    }

    let page_count = rankings.len().div_ceil(RANKINGS_PER_PAGE);
    let district_key = district_key.to_string();
    let render: RenderFn<Embed> = Box::new(move |page| {
      let start = page * RANKINGS_PER_PAGE;
      let end = (start + RANKINGS_PER_PAGE).min(rankings.len());
      Ok(format::format_district_rankings(
        &rankings[start..end],
        &format!(
          "District Rankings - {} - Page {}/{}",
          district_key,
          page + 1,
          page_count
        ),
      ))
    });

    CommandReply::paged(render, page_count)
  }

  /// Playoff bracket for an event, one page per double-elimination round.
  pub async fn bracket(&self, event_key: &str) -> Result<CommandReply> {
    let matches = self.tba.event_matches_simple(event_key).await?;
    let mut playoff: Vec<MatchSimple> = matches
      .into_iter()
      .filter(|m| m.comp_level != CompLevel::Qm)
      .collect();
    playoff.sort_by_key(|m| m.set_number);

    if playoff.is_empty() {
      return Ok(CommandReply::single(format::notice(
        "Playoff Bracket",
        "No matches found.",
      )));
    }

    let page_count = bracket_page_count(playoff.len());
    let event_key = event_key.to_string();
    let render: RenderFn<Embed> = Box::new(move |page| {
      let (start, end, round) = BRACKET_ROUNDS[page];
      let start = start.min(playoff.len());
      let end = end.min(playoff.len());
      Ok(format::format_playoff_round(
        &playoff[start..end],
        &format!("{} - {} - Page {}/{}", round, event_key, page + 1, page_count),
      ))
    });

    CommandReply::paged(render, page_count)
  }

  /// Predicted final rankings for an event.
  pub async fn predictions(&self, event_key: &str) -> Result<CommandReply> {
    let predictions = self.tba.event_predictions(event_key).await?;

    let mut rankings: Vec<RankingPrediction> =
      predictions.ranking_predictions.unwrap_or_default();
    if rankings.is_empty() {
      return Ok(CommandReply::single(format::notice(
        "Predictions",
        "Predictions not available.",
      )));
    }
    rankings.sort_by(|a, b| {
      b.ranking_points()
        .partial_cmp(&a.ranking_points())
        .unwrap_or(Ordering::Equal)
    });

    let page_count = rankings.len().div_ceil(PREDICTIONS_PER_PAGE);
    let event_key = event_key.to_string();
    let render: RenderFn<Embed> = Box::new(move |page| {
      let start = page * PREDICTIONS_PER_PAGE;
      let end = (start + PREDICTIONS_PER_PAGE).min(rankings.len());
      Ok(format::format_rank_predictions(
        &rankings[start..end],
        start + 1,
        &format!("Predictions - {} - Page {}/{}", event_key, page + 1, page_count),
      ))
    });

    CommandReply::paged(render, page_count)
  }

  /// Current qualification rankings for an event.
  pub async fn rankings(&self, event_key: &str) -> Result<CommandReply> {
    let rankings = self.tba.event_rankings(event_key).await?.rankings;
    if rankings.is_empty() {
      return Ok(CommandReply::single(format::notice(
        "Rankings",
        "No rankings available.",
      )));
    }

    let page_count = rankings.len().div_ceil(RANKINGS_PER_PAGE);
    let event_key = event_key.to_string();
    let render: RenderFn<Embed> = Box::new(move |page| {
      let start = page * RANKINGS_PER_PAGE;
      let end = (start + RANKINGS_PER_PAGE).min(rankings.len());
      Ok(format::format_rankings(
        &rankings[start..end],
        &format!("Rankings - {} - Page {}/{}", event_key, page + 1, page_count),
      ))
    });

    CommandReply::paged(render, page_count)
  }

  /// OPR leaderboard for an event.
  pub async fn oprs(&self, event_key: &str) -> Result<CommandReply> {
    let oprs = self.tba.event_oprs(event_key).await?.oprs;
    if oprs.is_empty() {
      return Ok(CommandReply::single(format::notice(
        "OPRs",
        "No OPRs available.",
      )));
    }

    let mut rows: Vec<(String, f64)> = oprs.into_iter().collect();
    rows.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let page_count = rows.len().div_ceil(RANKINGS_PER_PAGE);
    let event_key = event_key.to_string();
    let render: RenderFn<Embed> = Box::new(move |page| {
      let start = page * RANKINGS_PER_PAGE;
      let end = (start + RANKINGS_PER_PAGE).min(rows.len());
      Ok(format::format_oprs(
        &rows[start..end],
        start + 1,
        &format!("OPRs - {} - Page {}/{}", event_key, page + 1, page_count),
      ))
    });

    CommandReply::paged(render, page_count)
  }
}

/// Page-per-round mapping for a double-elimination bracket, as positions in
/// the set-number-sorted playoff match list.
const BRACKET_ROUNDS: [(usize, usize, &str); 8] = [
  (0, 4, "Upper Round 1"),
  (4, 6, "Lower Round 1"),
  (6, 8, "Upper Round 2"),
  (8, 10, "Lower Round 2"),
  (10, 11, "Upper Finals"),
  (11, 12, "Lower Round 3"),
  (12, 13, "Lower Finals"),
  (13, 14, "Grand Finals"),
];

/// How many bracket rounds are at least partially populated by `matches`
/// playoff matches.
fn bracket_page_count(matches: usize) -> usize {
  match matches {
    0..=5 => 1,
    6 | 7 => 2,
    8 | 9 => 3,
    10 => 4,
    11 => 5,
    12 => 6,
    13 => 7,
    _ => 8,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bracket_page_count_matches_round_boundaries() {
    assert_eq!(bracket_page_count(1), 1);
    assert_eq!(bracket_page_count(5), 1);
    assert_eq!(bracket_page_count(6), 2);
    assert_eq!(bracket_page_count(8), 3);
    assert_eq!(bracket_page_count(10), 4);
    assert_eq!(bracket_page_count(11), 5);
    assert_eq!(bracket_page_count(12), 6);
    assert_eq!(bracket_page_count(13), 7);
    assert_eq!(bracket_page_count(14), 8);
    assert_eq!(bracket_page_count(20), 8);
  }

  #[test]
  fn every_bracket_page_has_a_nonempty_clamped_range() {
    for count in 1..=20usize {
      let pages = bracket_page_count(count);
      for page in 0..pages {
        let (start, end, _) = BRACKET_ROUNDS[page];
        let start = start.min(count);
        let end = end.min(count);
        assert!(start <= end);
        assert!(page == 0 || start < count, "page {page} empty at {count}");
      }
    }
  }
}
