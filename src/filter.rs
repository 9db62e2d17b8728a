use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::prediction::Prediction;

/// Leagues the filter always offers, whether or not the batch mentions them.
pub const SUPPORTED_LEAGUES: [&str; 8] = [
    "Premier League",
    "LaLiga",
    "Serie A",
    "Bundesliga",
    "Ligue 1",
    "Copa Libertadores",
    "Champions League",
    "Europa League",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateWindow {
    #[default]
    All,
    Today,
    Upcoming,
}

impl DateWindow {
    pub fn cycle(self) -> Self {
        match self {
            DateWindow::All => DateWindow::Today,
            DateWindow::Today => DateWindow::Upcoming,
            DateWindow::Upcoming => DateWindow::All,
        }
    }
}

pub fn date_window_label(window: DateWindow) -> &'static str {
    match window {
        DateWindow::All => "Todos",
        DateWindow::Today => "Hoy",
        DateWindow::Upcoming => "Próximos",
    }
}

/// League and date selections. An empty league set means every league.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSelection {
    pub leagues: BTreeSet<String>,
    pub date: DateWindow,
}

impl FilterSelection {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_default(&self) -> bool {
        self.leagues.is_empty() && self.date == DateWindow::All
    }

    pub fn toggle_league(&mut self, league: &str) {
        if !self.leagues.remove(league) {
            self.leagues.insert(league.to_string());
        }
    }

    pub fn select_all_leagues(&mut self) {
        self.leagues.clear();
    }

    pub fn is_league_selected(&self, league: &str) -> bool {
        self.leagues.contains(league)
    }
}

pub fn filter_by_league<'a>(
    predictions: &[&'a Prediction],
    leagues: &BTreeSet<String>,
) -> Vec<&'a Prediction> {
    if leagues.is_empty() {
        return predictions.to_vec();
    }
    predictions
        .iter()
        .copied()
        .filter(|p| leagues.contains(&p.league))
        .collect()
}

/// Date filter evaluated against the clock at call time.
pub fn filter_by_date<'a>(
    predictions: &[&'a Prediction],
    window: DateWindow,
) -> Vec<&'a Prediction> {
    filter_by_date_at(predictions, window, Utc::now())
}

pub fn filter_by_date_at<'a>(
    predictions: &[&'a Prediction],
    window: DateWindow,
    now: DateTime<Utc>,
) -> Vec<&'a Prediction> {
    if window == DateWindow::All {
        return predictions.to_vec();
    }
    let (today, tomorrow) = utc_day_bounds(now);
    predictions
        .iter()
        .copied()
        .filter(|p| {
            let Some(kickoff) = parse_kickoff(&p.kickoff) else {
                return false;
            };
            match window {
                DateWindow::Today => kickoff >= today && kickoff < tomorrow,
                DateWindow::Upcoming => kickoff >= tomorrow,
                DateWindow::All => true,
            }
        })
        .collect()
}

/// League filter, then date filter.
pub fn apply_filters<'a>(
    predictions: &'a [Prediction],
    selection: &FilterSelection,
    now: DateTime<Utc>,
) -> Vec<&'a Prediction> {
    let all: Vec<&Prediction> = predictions.iter().collect();
    let by_league = filter_by_league(&all, &selection.leagues);
    filter_by_date_at(&by_league, selection.date, now)
}

/// Known roster plus every league in the batch, deduplicated and sorted.
pub fn available_leagues(predictions: Option<&[Prediction]>) -> Vec<String> {
    let Some(predictions) = predictions else {
        return Vec::new();
    };
    let leagues: BTreeSet<String> = SUPPORTED_LEAGUES
        .iter()
        .map(|l| l.to_string())
        .chain(predictions.iter().map(|p| p.league.clone()))
        .collect();
    leagues.into_iter().collect()
}

pub fn utc_day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

pub fn parse_kickoff(raw: &str) -> Option<DateTime<Utc>> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];

    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(cleaned) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(cleaned, fmt) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(cleaned, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::{Outcome, Probabilities};

    fn pred(label: &str, league: &str, kickoff: &str) -> Prediction {
        Prediction {
            match_label: label.to_string(),
            league: league.to_string(),
            kickoff: kickoff.to_string(),
            outcome: Outcome::Local,
            probabilities: Probabilities {
                local: 50,
                draw: 25,
                visitor: 25,
            },
            rationale: String::new(),
            home_logo: String::new(),
            away_logo: String::new(),
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-19T15:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn day_bounds_are_utc_midnights() {
        let (start, end) = utc_day_bounds(now());
        assert_eq!(start.to_rfc3339(), "2026-10-19T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-10-20T00:00:00+00:00");
    }

    #[test]
    fn today_window_is_half_open() {
        let batch = vec![
            pred("a vs b", "LaLiga", "2026-10-19T00:00:00Z"),
            pred("c vs d", "LaLiga", "2026-10-19T23:59:59Z"),
            pred("e vs f", "LaLiga", "2026-10-20T00:00:00Z"),
            pred("g vs h", "LaLiga", "2026-10-18T23:59:59Z"),
        ];
        let all: Vec<&Prediction> = batch.iter().collect();
        let today = filter_by_date_at(&all, DateWindow::Today, now());
        let labels: Vec<&str> = today.iter().map(|p| p.match_label.as_str()).collect();
        assert_eq!(labels, vec!["a vs b", "c vs d"]);

        let upcoming = filter_by_date_at(&all, DateWindow::Upcoming, now());
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].match_label, "e vs f");
    }

    #[test]
    fn offsets_are_converted_to_utc() {
        // 01:00 on the 20th in +02:00 is 23:00 UTC on the 19th.
        let batch = vec![pred("a vs b", "Serie A", "2026-10-20T01:00:00+02:00")];
        let all: Vec<&Prediction> = batch.iter().collect();
        assert_eq!(filter_by_date_at(&all, DateWindow::Today, now()).len(), 1);
    }

    #[test]
    fn unparseable_kickoff_only_passes_all() {
        let batch = vec![pred("a vs b", "Serie A", "mañana por la tarde")];
        let all: Vec<&Prediction> = batch.iter().collect();
        assert_eq!(filter_by_date_at(&all, DateWindow::All, now()).len(), 1);
        assert!(filter_by_date_at(&all, DateWindow::Today, now()).is_empty());
        assert!(filter_by_date_at(&all, DateWindow::Upcoming, now()).is_empty());
    }

    #[test]
    fn league_filter_is_exact_and_case_sensitive() {
        let batch = vec![
            pred("a vs b", "LaLiga", "2026-10-19T20:00:00Z"),
            pred("c vs d", "laliga", "2026-10-19T20:00:00Z"),
        ];
        let all: Vec<&Prediction> = batch.iter().collect();
        let selected: BTreeSet<String> = ["LaLiga".to_string()].into();
        let kept = filter_by_league(&all, &selected);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].match_label, "a vs b");
    }

    #[test]
    fn naive_timestamps_are_read_as_utc() {
        let parsed = parse_kickoff("2026-10-19 18:45").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-10-19T18:45:00+00:00");
        assert!(parse_kickoff("2026-10-19").is_some());
        assert!(parse_kickoff("").is_none());
    }

    #[test]
    fn toggle_adds_then_removes() {
        let mut selection = FilterSelection::default();
        selection.toggle_league("Bundesliga");
        assert!(selection.is_league_selected("Bundesliga"));
        selection.toggle_league("Bundesliga");
        assert!(selection.leagues.is_empty());
        selection.date = DateWindow::Today.cycle();
        assert_eq!(selection.date, DateWindow::Upcoming);
        selection.reset();
        assert!(selection.is_default());
    }

    #[test]
    fn leagues_merge_roster_with_batch() {
        let batch = vec![
            pred("a vs b", "Eredivisie", "2026-10-19T20:00:00Z"),
            pred("c vs d", "LaLiga", "2026-10-19T20:00:00Z"),
        ];
        let leagues = available_leagues(Some(&batch));
        assert_eq!(leagues.len(), SUPPORTED_LEAGUES.len() + 1);
        assert!(leagues.contains(&"Eredivisie".to_string()));
        let mut sorted = leagues.clone();
        sorted.sort();
        assert_eq!(leagues, sorted);
        assert!(available_leagues(None).is_empty());
    }
}
