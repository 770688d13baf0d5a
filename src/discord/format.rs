//! Embed builders for match lists, brackets and rankings.

use chrono::{Local, TimeZone};
use twilight_model::channel::message::Embed;
use twilight_util::builder::embed::{EmbedBuilder, EmbedFieldBuilder, EmbedFooterBuilder};

use crate::tba::types::{
  CompLevel, DistrictRanking, Event, MatchAlliance, MatchPrediction, MatchPredictions,
  MatchSimple, RankingPrediction, TeamRanking,
};

/// Strip the `frc` prefix from a team key.
pub fn team_number(team_key: &str) -> &str {
  team_key.strip_prefix("frc").unwrap_or(team_key)
}

/// A plain one-field notice, also used for error replies.
pub fn notice(title: &str, description: &str) -> Embed {
  EmbedBuilder::new()
    .title(title)
    .description(description)
    .build()
}

/// Human-readable name for a match, including the double-elimination round
/// table for `sf` set numbers.
pub fn match_label(m: &MatchSimple) -> String {
  match m.comp_level {
    CompLevel::Qm => format!("Qualification {}", m.match_number),
    CompLevel::Sf => {
      let round = match m.set_number {
        1..=4 => "Upper Quarterfinals",
        5 | 6 => "Lower Round 1",
        7 | 8 => "Upper Semifinals",
        9 | 10 => "Lower Round 2",
        11 => "Upper Finals",
        12 => "Lower Round 3",
        13 => "Lower Finals",
        14 => "Finals",
        _ => "Playoff Match",
      };
      format!("{} ({})", round, m.set_number)
    }
    CompLevel::F => format!("Finals {}", m.match_number),
    _ => "Match".to_string(),
  }
}

/// `123-456-789`, with the highlighted team underlined.
fn alliance_teams(alliance: &MatchAlliance, highlight: u32) -> String {
  let highlight = highlight.to_string();
  alliance
    .team_keys
    .iter()
    .map(|key| {
      let number = team_number(key);
      if number == highlight {
        format!("__{}__", number)
      } else {
        number.to_string()
      }
    })
    .collect::<Vec<_>>()
    .join("-")
}

fn has_been_played(m: &MatchSimple) -> bool {
  m.alliances
    .as_ref()
    .and_then(|a| a.red.score)
    .is_some_and(|score| score >= 0)
}

fn prediction_for<'a>(
  predictions: &'a MatchPredictions,
  m: &MatchSimple,
) -> Option<&'a MatchPrediction> {
  if m.comp_level == CompLevel::Qm {
    predictions.qual.get(&m.key)
  } else {
    predictions.playoff.get(&m.key)
  }
}

/// One embed field per match: played matches show scores with the winner in
/// bold, unplayed ones fall back to predicted scores (italic winner, starred
/// points) when predictions are available.
pub fn format_matches(
  matches: &[MatchSimple],
  title: &str,
  highlight_team: u32,
  predictions: Option<&MatchPredictions>,
) -> Embed {
  let mut embed = EmbedBuilder::new().title(title);
  let mut last_event_key = "";
  let mut any_predicted = false;

  for m in matches {
    if m.event_key != last_event_key {
      embed = embed.field(EmbedFieldBuilder::new(
        format!("__**{}**__", m.event_key),
        "\u{200b}",
      ));
      last_event_key = &m.event_key;
    }

    let time_text = m
      .predicted_time
      .and_then(|ts| Local.timestamp_opt(ts, 0).single())
      .map(|t| t.format("%a %I:%M %p").to_string())
      .unwrap_or_default();

    let alliances_text = match &m.alliances {
      None => String::new(),
      Some(alliances) => {
        let red = alliance_teams(&alliances.red, highlight_team);
        let blue = alliance_teams(&alliances.blue, highlight_team);

        if has_been_played(m) {
          let red_points = alliances.red.score.unwrap_or(0);
          let blue_points = alliances.blue.score.unwrap_or(0);
          let mut red_text = format!("{} ({})", red, red_points);
          let mut blue_text = format!("({}) {}", blue_points, blue);
          match m.winning_alliance.as_deref() {
            Some("red") => red_text = format!("**{}**", red_text),
            Some("blue") => blue_text = format!("**{}**", blue_text),
            _ => {}
          }
          format!("{} vs {}", red_text, blue_text)
        } else if let Some(prediction) = predictions.and_then(|p| prediction_for(p, m)) {
          any_predicted = true;
          let red_points = prediction.red.score.round() as i64;
          let blue_points = prediction.blue.score.round() as i64;
          let mut red_text = format!("{} ({}\\*)", red, red_points);
          let mut blue_text = format!("({}\\*) {}", blue_points, blue);
          match prediction.winning_alliance.as_deref() {
            Some("red") => red_text = format!("*{}*", red_text),
            Some("blue") => blue_text = format!("*{}*", blue_text),
            _ => {}
          }
          format!("{} vs {}", red_text, blue_text)
        } else {
          format!("{} vs {}", red, blue)
        }
      }
    };

    embed = embed.field(EmbedFieldBuilder::new(
      format!("{} | {}", match_label(m), time_text),
      if alliances_text.is_empty() {
        "\u{200b}".to_string()
      } else {
        alliances_text
      },
    ));
  }

  if any_predicted {
    embed = embed.footer(EmbedFooterBuilder::new("* Predicted Points"));
  }

  embed.build()
}

const BRACKET_SLOT_WIDTH: usize = 15;

/// Bracket-line art for one playoff round: each match is a red line over a
/// blue line, right-aligned in a code span.
pub fn format_playoff_round(matches: &[MatchSimple], title: &str) -> Embed {
  let mut lines = Vec::new();

  for m in matches {
    if let Some(alliances) = &m.alliances {
      let red = plain_teams(&alliances.red);
      let blue = plain_teams(&alliances.blue);

      let mut art = String::from("__");
      art.push_str(&bracket_slot(&red));
      art.push_str(&"\\_".repeat(3));
      art.push_str("__\n__");
      art.push_str(&bracket_slot(&blue));
      art.push_str(&"\\_".repeat(3));
      art.push_str("__");
      art.push_str(&"\u{203E}".repeat(5));

      lines.push(art);
    }
  }

  EmbedBuilder::new()
    .title(title)
    .description(lines.join("\n\n"))
    .build()
}

fn plain_teams(alliance: &MatchAlliance) -> String {
  alliance
    .team_keys
    .iter()
    .map(|key| team_number(key))
    .collect::<Vec<_>>()
    .join("-")
}

fn bracket_slot(teams: &str) -> String {
  let pad = BRACKET_SLOT_WIDTH.saturating_sub(teams.len());
  format!("`{}{}`", " ".repeat(pad), teams)
}

/// Event list for a team: name, key, dates, week, venue.
pub fn format_events(events: &[Event], team: u32) -> Embed {
  let entries: Vec<String> = events
    .iter()
    .map(|event| {
      let week = event
        .week
        .map(|w| format!(" (Week {})", w))
        .unwrap_or_default();
      let venue = event
        .location_name
        .as_deref()
        .map(|name| format!("\n*@ {}*", name))
        .unwrap_or_default();
      format!(
        "**{} ({})**\n*{} - {}{}*{}",
        event.name, event.key, event.start_date, event.end_date, week, venue
      )
    })
    .collect();

  EmbedBuilder::new()
    .title(format!("Events - {}", team))
    .description(entries.join("\n\n"))
    .build()
}

/// Predicted final rankings, one inline field per team.
pub fn format_rank_predictions(
  predictions: &[RankingPrediction],
  first_rank: usize,
  title: &str,
) -> Embed {
  let mut embed = EmbedBuilder::new().title(title);

  for (offset, team) in predictions.iter().enumerate() {
    let points = team.ranking_points().unwrap_or(0.0).round() as i64;
    embed = embed.field(
      EmbedFieldBuilder::new(
        format!("{}. {}", first_rank + offset, team_number(team.team_key())),
        format!("{} RP", points),
      )
      .inline(),
    );
  }

  embed.build()
}

/// Current event rankings as one line per team.
pub fn format_rankings(rankings: &[TeamRanking], title: &str) -> Embed {
  let lines: Vec<String> = rankings
    .iter()
    .map(|r| {
      let record = r
        .record
        .as_ref()
        .map(|rec| format!(" ({}-{}-{})", rec.wins, rec.losses, rec.ties))
        .unwrap_or_default();
      format!(
        "`{:>3}.` **{}**{} in {} matches",
        r.rank,
        team_number(&r.team_key),
        record,
        r.matches_played
      )
    })
    .collect();

  EmbedBuilder::new()
    .title(title)
    .description(lines.join("\n"))
    .build()
}

/// OPR leaderboard as one line per team.
pub fn format_oprs(rows: &[(String, f64)], first_rank: usize, title: &str) -> Embed {
  let lines: Vec<String> = rows
    .iter()
    .enumerate()
    .map(|(offset, (team_key, opr))| {
      format!(
        "`{:>3}.` **{}** {:.1}",
        first_rank + offset,
        team_number(team_key),
        opr
      )
    })
    .collect();

  EmbedBuilder::new()
    .title(title)
    .description(lines.join("\n"))
    .build()
}

/// District leaderboard as one line per team.
pub fn format_district_rankings(rankings: &[DistrictRanking], title: &str) -> Embed {
  let lines: Vec<String> = rankings
    .iter()
    .map(|r| {
      format!(
        "`{:>3}.` **{}** {} pts",
        r.rank,
        team_number(&r.team_key),
        r.point_total
      )
    })
    .collect();

  EmbedBuilder::new()
    .title(title)
    .description(lines.join("\n"))
    .build()
}

/// TBA status strings use `<b>` markup; Discord wants `**`.
fn status_text(status: &str) -> String {
  status.replace("<b>", "**").replace("</b>", "**")
}

/// Per-event status lines for one team. Entries without a status show a
/// placeholder.
pub fn format_statuses(statuses: &[(String, Option<String>)], title: &str) -> Embed {
  let lines: Vec<String> = statuses
    .iter()
    .map(|(event_key, status)| match status {
      Some(s) => format!("**{}**: {}", event_key, status_text(s)),
      None => format!("**{}**: no status yet", event_key),
    })
    .collect();

  EmbedBuilder::new()
    .title(title)
    .description(lines.join("\n"))
    .build()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tba::types::{AlliancePrediction, MatchAlliances};

  fn simple_match(comp_level: CompLevel, set_number: i64, match_number: i64) -> MatchSimple {
    MatchSimple {
      key: "2023casj_x".to_string(),
      comp_level,
      set_number,
      match_number,
      alliances: None,
      winning_alliance: None,
      event_key: "2023casj".to_string(),
      predicted_time: None,
    }
  }

  #[test]
  fn match_labels_follow_the_double_elim_table() {
    let cases = [
      (CompLevel::Qm, 1, 12, "Qualification 12"),
      (CompLevel::Sf, 3, 1, "Upper Quarterfinals (3)"),
      (CompLevel::Sf, 5, 1, "Lower Round 1 (5)"),
      (CompLevel::Sf, 8, 1, "Upper Semifinals (8)"),
      (CompLevel::Sf, 10, 1, "Lower Round 2 (10)"),
      (CompLevel::Sf, 11, 1, "Upper Finals (11)"),
      (CompLevel::Sf, 12, 1, "Lower Round 3 (12)"),
      (CompLevel::Sf, 13, 1, "Lower Finals (13)"),
      (CompLevel::Sf, 14, 1, "Finals (14)"),
      (CompLevel::Sf, 99, 1, "Playoff Match (99)"),
      (CompLevel::F, 1, 2, "Finals 2"),
      (CompLevel::Qf, 2, 1, "Match"),
    ];

    for (level, set, number, expected) in cases {
      assert_eq!(match_label(&simple_match(level, set, number)), expected);
    }
  }

  #[test]
  fn highlighted_team_is_underlined() {
    let alliance = MatchAlliance {
      score: Some(-1),
      team_keys: vec!["frc254".into(), "frc1114".into(), "frc118".into()],
    };
    assert_eq!(alliance_teams(&alliance, 1114), "254-__1114__-118");
    assert_eq!(alliance_teams(&alliance, 9999), "254-1114-118");
  }

  #[test]
  fn played_match_shows_scores_and_bolds_the_winner() {
    let mut m = simple_match(CompLevel::Qm, 1, 3);
    m.alliances = Some(MatchAlliances {
      red: MatchAlliance {
        score: Some(52),
        team_keys: vec!["frc1".into()],
      },
      blue: MatchAlliance {
        score: Some(47),
        team_keys: vec!["frc2".into()],
      },
    });
    m.winning_alliance = Some("red".to_string());

    let embed = format_matches(std::slice::from_ref(&m), "Matches", 0, None);
    // Field 0 is the event header, field 1 the match.
    let value = &embed.fields[1].value;
    assert!(value.contains("**1 (52)**"), "got {value}");
    assert!(value.contains("(47) 2"));
  }

  #[test]
  fn unplayed_match_uses_predictions_and_sets_the_footer() {
    let mut m = simple_match(CompLevel::Qm, 1, 3);
    m.key = "2023casj_qm3".to_string();
    m.alliances = Some(MatchAlliances {
      red: MatchAlliance {
        score: Some(-1),
        team_keys: vec!["frc1".into()],
      },
      blue: MatchAlliance {
        score: Some(-1),
        team_keys: vec!["frc2".into()],
      },
    });

    let mut predictions = MatchPredictions::default();
    predictions.qual.insert(
      "2023casj_qm3".to_string(),
      MatchPrediction {
        red: AlliancePrediction { score: 40.4 },
        blue: AlliancePrediction { score: 51.6 },
        winning_alliance: Some("blue".to_string()),
      },
    );

    let embed = format_matches(std::slice::from_ref(&m), "Matches", 0, Some(&predictions));
    let value = &embed.fields[1].value;
    assert!(value.contains("1 (40\\*)"), "got {value}");
    assert!(value.contains("*(52\\*) 2*"), "got {value}");
    assert_eq!(embed.footer.as_ref().unwrap().text, "* Predicted Points");
  }

  #[test]
  fn bracket_art_right_aligns_both_alliances() {
    let mut m = simple_match(CompLevel::Sf, 1, 1);
    m.alliances = Some(MatchAlliances {
      red: MatchAlliance {
        score: Some(-1),
        team_keys: vec!["frc1".into(), "frc2".into()],
      },
      blue: MatchAlliance {
        score: Some(-1),
        team_keys: vec!["frc33".into(), "frc44".into()],
      },
    });

    let embed = format_playoff_round(std::slice::from_ref(&m), "Upper Round 1");
    let description = embed.description.unwrap();
    assert!(description.contains("`            1-2`"));
    assert!(description.contains("`          33-44`"));
    assert!(description.contains("\u{203E}"));
  }

  #[test]
  fn district_rankings_render_rank_team_and_points() {
    let rankings = vec![
      DistrictRanking {
        rank: 1,
        team_key: "frc33".to_string(),
        point_total: 310,
      },
      DistrictRanking {
        rank: 2,
        team_key: "frc67".to_string(),
        point_total: 288,
      },
    ];

    let embed = format_district_rankings(&rankings, "District Rankings - 2023fim");
    let description = embed.description.unwrap();
    assert!(description.contains("`  1.` **33** 310 pts"), "got {description}");
    assert!(description.contains("`  2.` **67** 288 pts"));
  }

  #[test]
  fn status_markup_becomes_discord_bold() {
    let statuses = vec![
      (
        "2023casj".to_string(),
        Some("Team 604 is <b>Rank 3/40</b>".to_string()),
      ),
      ("2023cc".to_string(), None),
    ];

    let embed = format_statuses(&statuses, "Event Status - 604");
    let description = embed.description.unwrap();
    assert!(
      description.contains("**2023casj**: Team 604 is **Rank 3/40**"),
      "got {description}"
    );
    assert!(description.contains("**2023cc**: no status yet"));
  }

  #[test]
  fn matches_without_alliances_are_skipped_in_brackets() {
    let m = simple_match(CompLevel::Sf, 1, 1);
    let embed = format_playoff_round(std::slice::from_ref(&m), "Upper Round 1");
    assert_eq!(embed.description.unwrap(), "");
  }
}
