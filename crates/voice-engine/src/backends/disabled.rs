//! Placeholder for kiosks without speech input

use crate::engine::{RecognitionEngine, UtteranceSink};
use crate::VoiceError;
use async_trait::async_trait;

/// Recognizer that never initializes, leaving sessions speech-only
#[derive(Debug, Default)]
pub struct DisabledRecognizer;

#[async_trait]
impl RecognitionEngine for DisabledRecognizer {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn init(&self) -> Result<(), VoiceError> {
        Err(VoiceError::EngineInit("speech recognition disabled".into()))
    }

    fn start_listening(&self, _sink: UtteranceSink) -> Result<(), VoiceError> {
        Err(VoiceError::NotReady)
    }

    fn stop_listening(&self) {}

    fn set_vocabulary(&self, _words: Option<&[String]>) -> Result<(), VoiceError> {
        Err(VoiceError::NotReady)
    }

    async fn shutdown(&self) {}
}
