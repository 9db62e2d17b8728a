use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::error::FetchError;
use crate::filter::{self, DateWindow, FilterSelection};
use crate::history::{HistoryStore, remove_by_match_label};
use crate::prediction::{HistoryItem, Prediction, ResultTag, Verdict};
use crate::storage::KeyValueStore;

const MAX_LOGS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// Nothing requested yet.
    Idle,
    Loading,
    Loaded,
    /// Last fetch failed; holds the message shown to the user.
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Upcoming,
    History,
}

/// Messages from the fetch worker to the UI thread.
#[derive(Debug)]
pub enum Delta {
    PredictionsLoaded(Vec<Prediction>),
    FetchFailed(FetchError),
    Log(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderCommand {
    FetchPredictions,
}

/// Ephemeral dashboard state: fetch lifecycle, the active batch and the
/// filters over it. History lives in its own store and is passed in where a
/// user action touches both.
#[derive(Debug, Clone)]
pub struct AppState {
    pub view: View,
    pub status: FetchStatus,
    pub predictions: Option<Vec<Prediction>>,
    pub filters: FilterSelection,
    pub selected: usize,
    pub league_cursor: usize,
    pub history_selected: usize,
    pub detail_open: bool,
    pub help_overlay: bool,
    pub logs: VecDeque<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            view: View::Upcoming,
            status: FetchStatus::Idle,
            predictions: None,
            filters: FilterSelection::default(),
            selected: 0,
            league_cursor: 0,
            history_selected: 0,
            detail_open: false,
            help_overlay: false,
            logs: VecDeque::new(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Loading
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            FetchStatus::Error(message) => Some(message),
            _ => None,
        }
    }

    /// Enter `Loading`. Clears the error, the active batch and the filters so
    /// a new batch is never hidden by stale selections. Returns `false` and
    /// changes nothing if a fetch is already in flight.
    pub fn begin_fetch(&mut self) -> bool {
        if self.is_loading() {
            return false;
        }
        self.status = FetchStatus::Loading;
        self.predictions = None;
        self.filters.reset();
        self.selected = 0;
        self.league_cursor = 0;
        self.detail_open = false;
        true
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn filtered_predictions(&self) -> Vec<&Prediction> {
        self.filtered_predictions_at(Utc::now())
    }

    pub fn filtered_predictions_at(&self, now: DateTime<Utc>) -> Vec<&Prediction> {
        match &self.predictions {
            Some(batch) => filter::apply_filters(batch, &self.filters, now),
            None => Vec::new(),
        }
    }

    pub fn available_leagues(&self) -> Vec<String> {
        filter::available_leagues(self.predictions.as_deref())
    }

    pub fn selected_prediction(&self) -> Option<&Prediction> {
        self.filtered_predictions().get(self.selected).copied()
    }

    /// What to show instead of cards on the upcoming view, if anything.
    pub fn upcoming_empty_message(&self) -> Option<&'static str> {
        match &self.predictions {
            None => Some("Pulsa r para actualizar las predicciones."),
            Some(batch) if batch.is_empty() => {
                Some("No se encontraron predicciones. Inténtalo de nuevo más tarde.")
            }
            Some(_) if self.filtered_predictions().is_empty() => {
                Some("No hay predicciones que coincidan con los filtros seleccionados.")
            }
            Some(_) => None,
        }
    }

    pub fn toggle_view(&mut self) {
        self.view = match self.view {
            View::Upcoming => View::History,
            View::History => View::Upcoming,
        };
        self.detail_open = false;
    }

    pub fn select_next(&mut self, history_len: usize) {
        match self.view {
            View::Upcoming => {
                let total = self.filtered_predictions().len();
                self.selected = wrap_next(self.selected, total);
            }
            View::History => self.history_selected = wrap_next(self.history_selected, history_len),
        }
    }

    pub fn select_prev(&mut self, history_len: usize) {
        match self.view {
            View::Upcoming => {
                let total = self.filtered_predictions().len();
                self.selected = wrap_prev(self.selected, total);
            }
            View::History => self.history_selected = wrap_prev(self.history_selected, history_len),
        }
    }

    pub fn clamp_selection(&mut self, history_len: usize) {
        let total = self.filtered_predictions().len();
        self.selected = clamp_index(self.selected, total);
        self.history_selected = clamp_index(self.history_selected, history_len);
        let leagues = self.available_leagues().len();
        self.league_cursor = clamp_index(self.league_cursor, leagues);
    }

    pub fn league_cursor_next(&mut self) {
        let total = self.available_leagues().len();
        self.league_cursor = wrap_next(self.league_cursor, total);
    }

    pub fn league_cursor_prev(&mut self) {
        let total = self.available_leagues().len();
        self.league_cursor = wrap_prev(self.league_cursor, total);
    }

    pub fn toggle_league_at_cursor(&mut self) {
        let leagues = self.available_leagues();
        let Some(league) = leagues.get(self.league_cursor) else {
            return;
        };
        self.filters.toggle_league(league);
        self.selected = 0;
    }

    pub fn select_all_leagues(&mut self) {
        self.filters.select_all_leagues();
        self.selected = 0;
    }

    pub fn cycle_date_window(&mut self) {
        self.filters.date = self.filters.date.cycle();
        self.selected = 0;
    }

    pub fn set_date_window(&mut self, window: DateWindow) {
        self.filters.date = window;
        self.selected = 0;
    }

    /// Move a prediction into history and drop it, by match label, from the
    /// active batch.
    pub fn promote<S: KeyValueStore>(
        &mut self,
        history: &mut HistoryStore<S>,
        prediction: &Prediction,
    ) -> u64 {
        let label = prediction.match_label.clone();
        let id = match history.add(prediction.clone()) {
            Ok(id) => id,
            Err(err) => {
                self.push_log(format!("[WARN] History save failed: {err}"));
                history.items().first().map(|item| item.id).unwrap_or_default()
            }
        };
        if let Some(batch) = self.predictions.as_mut() {
            remove_by_match_label(batch, &label);
        }
        self.push_log(format!("[INFO] Moved to history: {label}"));
        self.clamp_selection(history.len());
        id
    }

    pub fn promote_selected<S: KeyValueStore>(
        &mut self,
        history: &mut HistoryStore<S>,
    ) -> Option<u64> {
        let prediction = self.selected_prediction()?.clone();
        self.detail_open = false;
        Some(self.promote(history, &prediction))
    }

    pub fn selected_history<'h, S: KeyValueStore>(
        &self,
        history: &'h HistoryStore<S>,
    ) -> Option<&'h HistoryItem> {
        history.items().get(self.history_selected)
    }

    /// Verdicts are only taken while the item is still pending.
    pub fn mark_selected_history<S: KeyValueStore>(
        &mut self,
        history: &mut HistoryStore<S>,
        verdict: Verdict,
    ) -> bool {
        let Some(item) = self.selected_history(history) else {
            return false;
        };
        if item.result != ResultTag::Pending {
            return false;
        }
        let id = item.id;
        if let Err(err) = history.mark_result(id, verdict) {
            self.push_log(format!("[WARN] History save failed: {err}"));
        }
        true
    }

    pub fn delete_selected_history<S: KeyValueStore>(
        &mut self,
        history: &mut HistoryStore<S>,
    ) -> bool {
        let Some(item) = self.selected_history(history) else {
            return false;
        };
        let id = item.id;
        let label = item.prediction.match_label.clone();
        if let Err(err) = history.delete(id) {
            self.push_log(format!("[WARN] History save failed: {err}"));
        }
        self.push_log(format!("[INFO] Deleted from history: {label}"));
        self.clamp_selection(history.len());
        true
    }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::PredictionsLoaded(batch) => {
            state.push_log(format!("[INFO] Loaded {} predictions", batch.len()));
            state.status = FetchStatus::Loaded;
            state.predictions = Some(batch);
            state.selected = 0;
            state.league_cursor = 0;
        }
        Delta::FetchFailed(err) => {
            state.push_log(format!("[WARN] Fetch failed: {err}"));
            state.status = FetchStatus::Error(err.user_message().to_string());
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}

pub fn view_label(view: View) -> &'static str {
    match view {
        View::Upcoming => "Próximas Predicciones",
        View::History => "Historial",
    }
}

pub fn status_label(status: &FetchStatus) -> &'static str {
    match status {
        FetchStatus::Idle => "SIN DATOS",
        FetchStatus::Loading => "ANALIZANDO...",
        FetchStatus::Loaded => "LISTO",
        FetchStatus::Error(_) => "ERROR",
    }
}

fn wrap_next(current: usize, total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    (current + 1) % total
}

fn wrap_prev(current: usize, total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    if current == 0 { total - 1 } else { current - 1 }
}

fn clamp_index(current: usize, total: usize) -> usize {
    if total == 0 { 0 } else { current.min(total - 1) }
}
