use std::sync::Mutex;

use chrono::{Duration as ChronoDuration, Timelike, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::http_client::http_client;
use crate::prediction::{Prediction, RawPrediction};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const TEMPERATURE: f32 = 0.2;

pub const PROMPT: &str = r#"
Eres un analista de fútbol experto en estadística deportiva y modelos predictivos. Busca en la web información actualizada sobre los partidos más relevantes de hoy y de los próximos 2 días y genera una predicción razonada para cada uno.

Ligas a considerar: Premier League (Inglaterra), LaLiga (España), Serie A (Italia), Bundesliga (Alemania), Ligue 1 (Francia), Copa Libertadores, Champions League y Europa League.

Para cada partido analiza:
1. Posición actual en la tabla.
2. Resultados de los últimos 5 partidos.
3. Promedio de goles anotados y recibidos.
4. Ventaja de jugar como local.
5. Enfrentamientos directos recientes.
6. Bajas importantes por lesión o sanción, si hay información.
7. Una URL pública y funcional del escudo de cada equipo.

Responde EXCLUSIVAMENTE con un string JSON válido que contenga un array de objetos, sin texto antes ni después. Estructura exacta:

[
  {
    "partido": "Equipo Local vs Equipo Visitante",
    "liga": "Nombre de la Liga o Torneo",
    "fecha": "Fecha y hora en ISO 8601 UTC (YYYY-MM-DDTHH:mm:ssZ)",
    "prediccion": "uno de ['Local', 'Empate', 'Visitante']",
    "probabilidad": {
      "local": <entero entre 0 y 100>,
      "empate": <entero entre 0 y 100>,
      "visitante": <entero entre 0 y 100>
    },
    "razonamiento": "Explicación breve de 1-2 frases.",
    "escudoLocal": "URL del escudo del equipo local",
    "escudoVisitante": "URL del escudo del equipo visitante"
  }
]

Las tres probabilidades de cada partido deben sumar exactamente 100. Genera entre 5 y 8 partidos. No devuelvas un array vacío.
"#;

/// Something that produces the model's raw text answer.
pub trait PredictionSource: Send {
    fn name(&self) -> &'static str;
    fn generate(&self) -> Result<String, FetchError>;
}

/// Run a source and turn its answer into a normalized batch.
pub fn fetch_predictions(source: &dyn PredictionSource) -> Result<Vec<Prediction>, FetchError> {
    let text = source.generate()?;
    let predictions = parse_predictions(&text)?;
    info!(
        source = source.name(),
        count = predictions.len(),
        "predictions fetched"
    );
    Ok(predictions)
}

/// The span from the first `[` to the last `]`, if there is one.
pub fn extract_json_array(text: &str) -> Result<&str, FetchError> {
    let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
        return Err(FetchError::InvalidResponseShape);
    };
    if end < start {
        return Err(FetchError::InvalidResponseShape);
    }
    Ok(&text[start..=end])
}

/// All-or-nothing: one bad entry rejects the whole batch.
pub fn parse_predictions(text: &str) -> Result<Vec<Prediction>, FetchError> {
    let json = extract_json_array(text)?;
    let raw: Vec<RawPrediction> = serde_json::from_str(json).inspect_err(|err| {
        warn!(error = %err, "model returned malformed prediction json");
    })?;
    Ok(raw.into_iter().map(RawPrediction::into_prediction).collect())
}

pub struct GeminiSource {
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiSource {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    tools: Vec<Tool>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl PredictionSource for GeminiSource {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn generate(&self) -> Result<String, FetchError> {
        let client = http_client().map_err(|err| FetchError::FetchFailed(format!("{err:#}")))?;
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: PROMPT }],
            }],
            tools: vec![Tool {
                google_search: GoogleSearch {},
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
            },
        };

        debug!(model = %self.model, "requesting predictions");
        let resp = client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()?;
        let status = resp.status();
        let raw = resp.text()?;
        if !status.is_success() {
            warn!(%status, "gemini request rejected");
            return Err(FetchError::FetchFailed(format!("http {status}: {raw}")));
        }
        response_text(&raw)
    }
}

fn response_text(raw: &str) -> Result<String, FetchError> {
    let envelope: GenerateResponse = serde_json::from_str(raw)
        .map_err(|err| FetchError::FetchFailed(format!("unreadable gemini envelope: {err}")))?;
    let text: String = envelope
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .filter_map(|p| p.text)
        .collect();
    if text.trim().is_empty() {
        return Err(FetchError::FetchFailed("gemini returned no text".to_string()));
    }
    Ok(text)
}

/// Offline stand-in for the model. Writes a plausible answer, prose and all,
/// with probabilities that do not always add up.
pub struct DemoSource {
    rng: Mutex<StdRng>,
}

impl DemoSource {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for DemoSource {
    fn default() -> Self {
        Self::new()
    }
}

const DEMO_FIXTURES: &[(&str, &[&str])] = &[
    (
        "Premier League",
        &["Arsenal", "Liverpool", "Chelsea", "Man City", "Newcastle", "Aston Villa"],
    ),
    (
        "LaLiga",
        &["Real Madrid", "Barcelona", "Atlético", "Sevilla", "Villarreal", "Real Sociedad"],
    ),
    ("Serie A", &["Inter", "Milan", "Juventus", "Napoli", "Roma", "Atalanta"]),
    ("Bundesliga", &["Bayern", "Dortmund", "Leverkusen", "Leipzig", "Stuttgart", "Frankfurt"]),
    ("Ligue 1", &["PSG", "Marseille", "Monaco", "Lyon", "Lille", "Nice"]),
    ("Copa Libertadores", &["Flamengo", "River Plate", "Palmeiras", "Boca Juniors"]),
    ("Eredivisie", &["Ajax", "PSV", "Feyenoord", "AZ"]),
];

const DEMO_REASONS: &[&str] = &[
    "El local llega con cuatro victorias seguidas y solo un gol encajado.",
    "Duelo parejo entre dos equipos que empataron sus últimos enfrentamientos.",
    "El visitante domina el historial reciente y recupera a su delantero titular.",
    "Bajas importantes en la defensa local inclinan la balanza.",
];

impl PredictionSource for DemoSource {
    fn name(&self) -> &'static str {
        "demo"
    }

    fn generate(&self) -> Result<String, FetchError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| FetchError::FetchFailed("demo generator poisoned".to_string()))?;
        let now = Utc::now();
        let count = rng.gen_range(5..=8);
        let mut entries = Vec::with_capacity(count);

        for _ in 0..count {
            let (league, teams) = DEMO_FIXTURES[rng.gen_range(0..DEMO_FIXTURES.len())];
            let picked: Vec<&&str> = teams.choose_multiple(&mut *rng, 2).collect();
            let (home, away) = (*picked[0], *picked[1]);

            let day = rng.gen_range(0..3);
            let hour = rng.gen_range(12..22);
            let kickoff = (now + ChronoDuration::days(day))
                .with_hour(hour)
                .and_then(|t| t.with_minute(0))
                .and_then(|t| t.with_second(0))
                .unwrap_or(now);

            let local: u32 = rng.gen_range(10..70);
            let draw: u32 = rng.gen_range(10..40);
            let visitor: u32 = rng.gen_range(10..70);
            let pick = if local >= visitor && local >= draw {
                "Local"
            } else if visitor >= draw {
                "Visitante"
            } else {
                "Empate"
            };

            entries.push(serde_json::json!({
                "partido": format!("{home} vs {away}"),
                "liga": league,
                "fecha": kickoff.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                "prediccion": pick,
                "probabilidad": { "local": local, "empate": draw, "visitante": visitor },
                "razonamiento": DEMO_REASONS[rng.gen_range(0..DEMO_REASONS.len())],
                "escudoLocal": "",
                "escudoVisitante": "",
            }));
        }

        let array = serde_json::to_string_pretty(&entries)
            .map_err(|err| FetchError::FetchFailed(err.to_string()))?;
        Ok(format!("Aquí tienes las predicciones:\n{array}\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRY: &str = r#"{"partido":"Inter vs Milan","liga":"Serie A","fecha":"2026-10-20T18:45:00Z",
        "prediccion":"Local","probabilidad":{"local":48.5,"empate":27,"visitante":30},
        "razonamiento":"Derbi con ventaja local.","escudoLocal":"","escudoVisitante":""}"#;

    struct FixedSource(Result<&'static str, ()>);

    impl PredictionSource for FixedSource {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn generate(&self) -> Result<String, FetchError> {
            self.0
                .map(str::to_string)
                .map_err(|_| FetchError::FetchFailed("unavailable".to_string()))
        }
    }

    #[test]
    fn extracts_array_wrapped_in_prose_and_fences() {
        let text = format!("```json\n[{ENTRY}]\n```");
        let json = extract_json_array(&text).unwrap();
        assert!(json.starts_with('['));
        assert!(json.ends_with(']'));
    }

    #[test]
    fn text_without_array_is_invalid_shape() {
        let err = parse_predictions("Lo siento, no hay partidos hoy.").unwrap_err();
        assert!(matches!(err, FetchError::InvalidResponseShape));
        let err = extract_json_array("] y luego [").unwrap_err();
        assert!(matches!(err, FetchError::InvalidResponseShape));
    }

    #[test]
    fn broken_array_is_malformed_json() {
        let err = parse_predictions("[{\"partido\": \"A vs B\",]").unwrap_err();
        assert!(matches!(err, FetchError::MalformedJson(_)));
    }

    #[test]
    fn one_bad_entry_rejects_the_batch() {
        let text = format!("[{ENTRY}, {{\"partido\": \"X vs Y\"}}]");
        assert!(matches!(
            parse_predictions(&text),
            Err(FetchError::MalformedJson(_))
        ));
    }

    #[test]
    fn parsed_batch_is_normalized() {
        let batch = parse_predictions(&format!("[{ENTRY}]")).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].probabilities.total(), 100);
        assert_eq!(batch[0].home_team(), "Inter");
    }

    #[test]
    fn empty_array_is_a_valid_batch() {
        assert!(parse_predictions("[]").unwrap().is_empty());
    }

    #[test]
    fn source_failure_propagates() {
        let err = fetch_predictions(&FixedSource(Err(()))).unwrap_err();
        assert!(matches!(err, FetchError::FetchFailed(_)));
        let ok = fetch_predictions(&FixedSource(Ok("[]"))).unwrap();
        assert!(ok.is_empty());
    }

    #[test]
    fn envelope_text_parts_are_joined() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"[{\"a\":"},{"text":"1}]"}]}}]}"#;
        assert_eq!(response_text(raw).unwrap(), "[{\"a\":1}]");
        assert!(matches!(
            response_text(r#"{"candidates":[]}"#),
            Err(FetchError::FetchFailed(_))
        ));
    }

    #[test]
    fn request_body_matches_generate_content_shape() {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: "hola" }],
            }],
            tools: vec![Tool {
                google_search: GoogleSearch {},
            }],
            generation_config: GenerationConfig { temperature: 0.2 },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hola");
        assert!(value["tools"][0]["google_search"].is_object());
        assert!(value["generationConfig"]["temperature"].is_number());
    }

    #[test]
    fn endpoint_joins_base_and_model() {
        let source = GeminiSource::new("k", "gemini-2.5-flash", "https://example.test/");
        assert_eq!(
            source.endpoint(),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn demo_source_output_survives_the_pipeline() {
        let source = DemoSource::with_seed(7);
        let batch = fetch_predictions(&source).unwrap();
        assert!((5..=8).contains(&batch.len()));
        for p in &batch {
            assert_eq!(p.probabilities.total(), 100);
            assert_ne!(p.home_team(), p.away_team());
        }
    }
}
