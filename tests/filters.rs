use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use prediction_desk::filter::{
    DateWindow, FilterSelection, SUPPORTED_LEAGUES, apply_filters, available_leagues,
    filter_by_date, filter_by_date_at, filter_by_league, utc_day_bounds,
};
use prediction_desk::prediction::{Outcome, Prediction, Probabilities};

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-10-19T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn pred(label: &str, league: &str, kickoff: &str) -> Prediction {
    Prediction {
        match_label: label.to_string(),
        league: league.to_string(),
        kickoff: kickoff.to_string(),
        outcome: Outcome::Local,
        probabilities: Probabilities {
            local: 40,
            draw: 30,
            visitor: 30,
        },
        rationale: String::new(),
        home_logo: String::new(),
        away_logo: String::new(),
    }
}

fn batch() -> Vec<Prediction> {
    vec![
        pred("Past vs Game", "LaLiga", "2026-10-18T20:00:00Z"),
        pred("Early vs Today", "Serie A", "2026-10-19T00:00:00Z"),
        pred("Late vs Today", "LaLiga", "2026-10-19T23:59:59Z"),
        pred("Midnight vs Tomorrow", "Bundesliga", "2026-10-20T00:00:00Z"),
        pred("Next vs Week", "Eredivisie", "2026-10-25T18:30:00Z"),
        pred("Mystery vs Date", "LaLiga", "pronto"),
    ]
}

fn labels(preds: &[&Prediction]) -> Vec<String> {
    preds.iter().map(|p| p.match_label.clone()).collect()
}

#[test]
fn default_selection_is_identity() {
    let batch = batch();
    let out = apply_filters(&batch, &FilterSelection::default(), now());
    assert_eq!(out.len(), batch.len());
    assert!(out.iter().zip(batch.iter()).all(|(a, b)| *a == b));
}

#[test]
fn today_and_upcoming_are_disjoint_and_cover_the_future() {
    let batch = batch();
    let all: Vec<&Prediction> = batch.iter().collect();
    let today = labels(&filter_by_date_at(&all, DateWindow::Today, now()));
    let upcoming = labels(&filter_by_date_at(&all, DateWindow::Upcoming, now()));

    assert_eq!(today, vec!["Early vs Today", "Late vs Today"]);
    assert_eq!(upcoming, vec!["Midnight vs Tomorrow", "Next vs Week"]);
    assert!(today.iter().all(|l| !upcoming.contains(l)));

    // Everything else is either in the past or has no readable kickoff.
    let rest: Vec<String> = labels(&all)
        .into_iter()
        .filter(|l| !today.contains(l) && !upcoming.contains(l))
        .collect();
    assert_eq!(rest, vec!["Past vs Game", "Mystery vs Date"]);
}

#[test]
fn league_filter_keeps_order_and_membership() {
    let batch = batch();
    let all: Vec<&Prediction> = batch.iter().collect();
    let leagues: BTreeSet<String> = ["LaLiga".to_string()].into_iter().collect();
    let out = labels(&filter_by_league(&all, &leagues));
    assert_eq!(out, vec!["Past vs Game", "Late vs Today", "Mystery vs Date"]);
}

#[test]
fn league_and_date_compose() {
    let batch = batch();
    let mut selection = FilterSelection::default();
    selection.toggle_league("LaLiga");
    selection.toggle_league("Bundesliga");
    selection.date = DateWindow::Upcoming;
    let out = labels(&apply_filters(&batch, &selection, now()));
    assert_eq!(out, vec!["Midnight vs Tomorrow"]);

    selection.select_all_leagues();
    let out = labels(&apply_filters(&batch, &selection, now()));
    assert_eq!(out, vec!["Midnight vs Tomorrow", "Next vs Week"]);
}

#[test]
fn clock_driven_date_filter_uses_the_current_day() {
    let now = Utc::now();
    let today = pred("Now vs Later", "LaLiga", &now.format("%Y-%m-%dT%H:%M:%SZ").to_string());
    let far = pred("Far vs Away", "LaLiga", "2099-01-01T12:00:00Z");
    let stale = pred("Old vs Gone", "LaLiga", "2001-01-01T12:00:00Z");
    let all = vec![&today, &far, &stale];

    assert_eq!(filter_by_date(&all, DateWindow::All).len(), 3);
    assert_eq!(labels(&filter_by_date(&all, DateWindow::Today)), vec!["Now vs Later"]);
    assert_eq!(labels(&filter_by_date(&all, DateWindow::Upcoming)), vec!["Far vs Away"]);
}

#[test]
fn day_bounds_are_utc_midnights() {
    let (start, end) = utc_day_bounds(now());
    assert_eq!(start.to_rfc3339(), "2026-10-19T00:00:00+00:00");
    assert_eq!(end.to_rfc3339(), "2026-10-20T00:00:00+00:00");
}

#[test]
fn available_leagues_merge_roster_and_batch() {
    let batch = batch();
    let leagues = available_leagues(Some(batch.as_slice()));
    for known in SUPPORTED_LEAGUES {
        assert!(leagues.iter().any(|l| l == known));
    }
    assert!(leagues.iter().any(|l| l == "Eredivisie"));
    let mut sorted = leagues.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted, leagues);
}
