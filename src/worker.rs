use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use crate::gemini::{PredictionSource, fetch_predictions};
use crate::state::{Delta, ProviderCommand};

/// Serve fetch commands on a background thread, one at a time, until the
/// command channel closes.
pub fn spawn_prediction_worker(
    source: Box<dyn PredictionSource>,
    tx: Sender<Delta>,
    cmd_rx: Receiver<ProviderCommand>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        info!(source = source.name(), "prediction worker started");
        for cmd in cmd_rx {
            match cmd {
                ProviderCommand::FetchPredictions => {
                    let _ = tx.send(Delta::Log(format!(
                        "[INFO] Requesting predictions from {}",
                        source.name()
                    )));
                    let delta = match fetch_predictions(source.as_ref()) {
                        Ok(batch) => Delta::PredictionsLoaded(batch),
                        Err(err) => {
                            warn!(error = %err, "prediction fetch failed");
                            Delta::FetchFailed(err)
                        }
                    };
                    if tx.send(delta).is_err() {
                        break;
                    }
                }
            }
        }
        info!("prediction worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::error::FetchError;

    struct Scripted(&'static str);

    impl PredictionSource for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn generate(&self) -> Result<String, FetchError> {
            Ok(self.0.to_string())
        }
    }

    fn run_once(text: &'static str) -> Vec<Delta> {
        let (tx, rx) = mpsc::channel();
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let handle = spawn_prediction_worker(Box::new(Scripted(text)), tx, cmd_rx);
        cmd_tx.send(ProviderCommand::FetchPredictions).unwrap();
        drop(cmd_tx);
        handle.join().unwrap();
        rx.try_iter().collect()
    }

    #[test]
    fn successful_fetch_emits_loaded_batch() {
        let deltas = run_once("[]");
        assert!(matches!(deltas.first(), Some(Delta::Log(_))));
        assert!(matches!(deltas.last(), Some(Delta::PredictionsLoaded(b)) if b.is_empty()));
    }

    #[test]
    fn non_json_answer_emits_failure() {
        let deltas = run_once("sin datos");
        assert!(matches!(
            deltas.last(),
            Some(Delta::FetchFailed(FetchError::InvalidResponseShape))
        ));
    }
}
