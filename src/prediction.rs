use serde::{Deserialize, Serialize};

use crate::normalize::normalize_probabilities;

pub const MATCH_SEPARATOR: &str = " vs ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "Local")]
    Local,
    #[serde(rename = "Empate")]
    Draw,
    #[serde(rename = "Visitante")]
    Visitor,
}

/// Outcome probabilities in whole percent. Always sums to 100 once built by
/// the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probabilities {
    pub local: u8,
    #[serde(rename = "empate")]
    pub draw: u8,
    #[serde(rename = "visitante")]
    pub visitor: u8,
}

impl Probabilities {
    pub fn total(&self) -> u32 {
        u32::from(self.local) + u32::from(self.draw) + u32::from(self.visitor)
    }

    pub fn for_outcome(&self, outcome: Outcome) -> u8 {
        match outcome {
            Outcome::Local => self.local,
            Outcome::Draw => self.draw,
            Outcome::Visitor => self.visitor,
        }
    }
}

/// Probability triple exactly as the model wrote it.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RawProbabilities {
    #[serde(default)]
    pub local: f64,
    #[serde(default, rename = "empate")]
    pub draw: f64,
    #[serde(default, rename = "visitante")]
    pub visitor: f64,
}

/// One entry of the model's JSON array, before normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPrediction {
    #[serde(rename = "partido")]
    pub match_label: String,
    #[serde(rename = "liga")]
    pub league: String,
    #[serde(rename = "fecha")]
    pub kickoff: String,
    #[serde(rename = "prediccion")]
    pub outcome: Outcome,
    #[serde(rename = "probabilidad")]
    pub probabilities: RawProbabilities,
    #[serde(rename = "razonamiento", default)]
    pub rationale: String,
    #[serde(rename = "escudoLocal", default)]
    pub home_logo: String,
    #[serde(rename = "escudoVisitante", default)]
    pub away_logo: String,
}

impl RawPrediction {
    pub fn into_prediction(self) -> Prediction {
        let RawProbabilities {
            local,
            draw,
            visitor,
        } = self.probabilities;
        Prediction {
            match_label: self.match_label,
            league: self.league,
            kickoff: self.kickoff,
            outcome: self.outcome,
            probabilities: normalize_probabilities(
                sanitize(local),
                sanitize(draw),
                sanitize(visitor),
            ),
            rationale: self.rationale,
            home_logo: self.home_logo,
            away_logo: self.away_logo,
        }
    }
}

// Negative and non-finite values are outside the normalizer's domain.
fn sanitize(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(rename = "partido")]
    pub match_label: String,
    #[serde(rename = "liga")]
    pub league: String,
    /// ISO-8601 UTC kickoff as sent by the model.
    #[serde(rename = "fecha")]
    pub kickoff: String,
    #[serde(rename = "prediccion")]
    pub outcome: Outcome,
    #[serde(rename = "probabilidad")]
    pub probabilities: Probabilities,
    #[serde(rename = "razonamiento", default)]
    pub rationale: String,
    #[serde(rename = "escudoLocal", default)]
    pub home_logo: String,
    #[serde(rename = "escudoVisitante", default)]
    pub away_logo: String,
}

impl Prediction {
    pub fn home_team(&self) -> &str {
        split_match_label(&self.match_label).0
    }

    pub fn away_team(&self) -> &str {
        split_match_label(&self.match_label).1
    }

    pub fn pick_label(&self) -> String {
        let pct = self.probabilities.for_outcome(self.outcome);
        match self.outcome {
            Outcome::Local => format!("{} ({pct}%)", self.home_team()),
            Outcome::Visitor => format!("{} ({pct}%)", self.away_team()),
            Outcome::Draw => format!("Empate ({pct}%)"),
        }
    }
}

pub fn split_match_label(label: &str) -> (&str, &str) {
    match label.split_once(MATCH_SEPARATOR) {
        Some((home, away)) => (home.trim(), away.trim()),
        None => (label.trim(), ""),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultTag {
    Pending,
    Correct,
    Incorrect,
}

/// A user verdict on an archived prediction. `Pending` is not a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect,
}

impl From<Verdict> for ResultTag {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Correct => ResultTag::Correct,
            Verdict::Incorrect => ResultTag::Incorrect,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    #[serde(flatten)]
    pub prediction: Prediction,
    pub id: u64,
    pub result: ResultTag,
}

pub fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Local => "Local",
        Outcome::Draw => "Empate",
        Outcome::Visitor => "Visitante",
    }
}

pub fn result_label(result: ResultTag) -> &'static str {
    match result {
        ResultTag::Pending => "Pendiente",
        ResultTag::Correct => "Acertada",
        ResultTag::Incorrect => "Fallada",
    }
}
