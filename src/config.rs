use std::env;
use std::path::PathBuf;

use tracing::warn;

use crate::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL, DemoSource, GeminiSource, PredictionSource};
use crate::storage::{JsonFileStore, KeyValueStore, MemoryStore, SqliteStore, app_data_dir};

const DEFAULT_EXPORT_PATH: &str = "historial_predicciones.xlsx";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Gemini,
    Demo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryBackend {
    Json,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub source: SourceKind,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub history_backend: HistoryBackend,
    pub history_path: Option<PathBuf>,
    pub export_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let opt = |key: &str| {
            lookup(key).and_then(|val| {
                let trimmed = val.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
        };

        let api_key = opt("GEMINI_API_KEY").or_else(|| opt("API_KEY"));
        // Without a key there is nothing to call, so fall back to the demo feed.
        let source = match opt("PREDICTION_SOURCE").map(|s| s.to_lowercase()).as_deref() {
            Some("demo") => SourceKind::Demo,
            _ if api_key.is_none() => SourceKind::Demo,
            _ => SourceKind::Gemini,
        };
        let history_backend = match opt("HISTORY_BACKEND").map(|s| s.to_lowercase()).as_deref() {
            Some("sqlite") => HistoryBackend::Sqlite,
            Some("memory") => HistoryBackend::Memory,
            _ => HistoryBackend::Json,
        };

        Self {
            source,
            api_key,
            model: opt("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: opt("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            history_backend,
            history_path: opt("HISTORY_PATH").map(PathBuf::from),
            export_path: opt("EXPORT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_PATH)),
        }
    }

    pub fn prediction_source(&self) -> Box<dyn PredictionSource> {
        match (self.source, self.api_key.as_ref()) {
            (SourceKind::Gemini, Some(key)) => Box::new(GeminiSource::new(
                key.clone(),
                self.model.clone(),
                self.base_url.clone(),
            )),
            _ => Box::new(DemoSource::new()),
        }
    }

    pub fn resolved_history_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.history_path {
            return Some(path.clone());
        }
        let file = match self.history_backend {
            HistoryBackend::Json => "history.json",
            HistoryBackend::Sqlite => "history.sqlite",
            HistoryBackend::Memory => return None,
        };
        app_data_dir().map(|dir| dir.join(file))
    }

    /// Open the configured backend. Anything that cannot be opened degrades
    /// to an in-memory store for this session.
    pub fn open_storage(&self) -> Box<dyn KeyValueStore> {
        let Some(path) = self.resolved_history_path() else {
            if self.history_backend != HistoryBackend::Memory {
                warn!("no data directory; history will not survive restarts");
            }
            return Box::new(MemoryStore::new());
        };
        match self.history_backend {
            HistoryBackend::Json => Box::new(JsonFileStore::new(path)),
            HistoryBackend::Sqlite => match SqliteStore::open(&path) {
                Ok(store) => Box::new(store),
                Err(err) => {
                    warn!(error = %err, path = %path.display(), "sqlite history unavailable");
                    Box::new(MemoryStore::new())
                }
            },
            HistoryBackend::Memory => Box::new(MemoryStore::new()),
        }
    }
}

pub fn source_label(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Gemini => "GEMINI",
        SourceKind::Demo => "DEMO",
    }
}
