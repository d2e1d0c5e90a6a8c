//! Typed utterances from stdin
//!
//! For attended kiosks and development boxes without a microphone model.
//! One line of input is one utterance.

use crate::engine::{RecognitionEngine, UtteranceSink};
use crate::normalize::normalize;
use crate::VoiceError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

#[derive(Default)]
struct ConsoleShared {
    sink: Option<UtteranceSink>,
    vocabulary: Option<HashSet<String>>,
}

/// Recognizer fed by lines typed on stdin
pub struct ConsoleRecognizer {
    shared: Arc<Mutex<ConsoleShared>>,
    reader_started: AtomicBool,
}

impl ConsoleRecognizer {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(ConsoleShared::default())),
            reader_started: AtomicBool::new(false),
        }
    }
}

impl Default for ConsoleRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep only the words a constrained recognizer could have produced.
/// Returns `None` when nothing survives.
pub fn constrain(utterance: &str, vocabulary: Option<&HashSet<String>>) -> Option<String> {
    let normalized = normalize(utterance);
    let kept = match vocabulary {
        Some(words) => normalized
            .split_whitespace()
            .filter(|word| words.contains(*word))
            .collect::<Vec<_>>()
            .join(" "),
        None => normalized,
    };
    (!kept.is_empty()).then_some(kept)
}

fn deliver(shared: &Mutex<ConsoleShared>, line: &str) {
    let Ok(shared) = shared.lock() else {
        return;
    };
    let Some(sink) = &shared.sink else {
        debug!("Console input ignored while not listening");
        return;
    };
    match constrain(line, shared.vocabulary.as_ref()) {
        Some(utterance) => {
            if sink.send(utterance).is_err() {
                debug!("Console utterance dropped: session gone");
            }
        }
        None => debug!("Console input '{}' outside vocabulary", line.trim()),
    }
}

#[async_trait]
impl RecognitionEngine for ConsoleRecognizer {
    fn name(&self) -> &str {
        "console"
    }

    async fn init(&self) -> Result<(), VoiceError> {
        if self.reader_started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        std::thread::Builder::new()
            .name("console-recognizer".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    match line {
                        Ok(line) => deliver(&shared, &line),
                        Err(e) => {
                            warn!("Console input closed: {}", e);
                            break;
                        }
                    }
                }
                debug!("Console reader finished");
            })
            .map_err(|e| VoiceError::EngineInit(format!("console reader thread: {}", e)))?;

        info!("Console recognizer reading stdin");
        Ok(())
    }

    fn start_listening(&self, sink: UtteranceSink) -> Result<(), VoiceError> {
        let mut shared = self
            .shared
            .lock()
            .map_err(|_| VoiceError::Recognition("console state poisoned".into()))?;
        shared.sink = Some(sink);
        Ok(())
    }

    fn stop_listening(&self) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.sink = None;
        }
    }

    fn set_vocabulary(&self, words: Option<&[String]>) -> Result<(), VoiceError> {
        let mut shared = self
            .shared
            .lock()
            .map_err(|_| VoiceError::Recognition("console state poisoned".into()))?;
        // An empty list constrains nothing
        shared.vocabulary = words.filter(|w| !w.is_empty()).map(|w| w.iter().cloned().collect());
        Ok(())
    }

    async fn shutdown(&self) {
        // The stdin thread cannot be interrupted; it simply has nowhere to deliver.
        self.stop_listening();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_constrain_filters_words() {
        let vocabulary: HashSet<String> = ["consulta", "externa"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            constrain("Quiero CONSULTA externa", Some(&vocabulary)).as_deref(),
            Some("consulta externa")
        );
        assert_eq!(constrain("nada que ver", Some(&vocabulary)), None);
        assert_eq!(constrain("  Hola  ", None).as_deref(), Some("hola"));
        assert_eq!(constrain("   ", None), None);
    }

    #[test]
    fn test_deliver_only_while_listening() {
        let recognizer = ConsoleRecognizer::new();
        deliver(&recognizer.shared, "aceptar");

        let (sink, mut rx) = mpsc::unbounded_channel();
        recognizer.start_listening(sink).unwrap();
        deliver(&recognizer.shared, "Aceptar");
        assert_eq!(rx.try_recv().unwrap(), "aceptar");

        recognizer.stop_listening();
        deliver(&recognizer.shared, "aceptar");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_empty_vocabulary_is_unconstrained() {
        let recognizer = ConsoleRecognizer::new();
        let (sink, mut rx) = mpsc::unbounded_channel();
        recognizer.start_listening(sink).unwrap();

        recognizer.set_vocabulary(Some(&[])).unwrap();
        deliver(&recognizer.shared, "aceptar");
        assert_eq!(rx.try_recv().unwrap(), "aceptar");
    }
}
