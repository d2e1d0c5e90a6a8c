//! Capability interfaces for speech engines
//!
//! Concrete recognizers and synthesizers stay behind these traits so the
//! session logic never depends on a particular platform engine.

use crate::VoiceError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Where a recognizer delivers final utterances
pub type UtteranceSink = mpsc::UnboundedSender<String>;

/// Speech-to-text engine
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Load models and open the audio line
    async fn init(&self) -> Result<(), VoiceError>;

    /// Start continuous recognition, sending each final utterance to `sink`
    fn start_listening(&self, sink: UtteranceSink) -> Result<(), VoiceError>;

    /// Stop recognition and drop the sink
    fn stop_listening(&self);

    /// Constrain recognition to `words`; `None` lifts the constraint
    fn set_vocabulary(&self, words: Option<&[String]>) -> Result<(), VoiceError>;

    /// Release every engine resource
    async fn shutdown(&self);
}

/// Text-to-speech engine
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Prepare the engine
    async fn init(&self) -> Result<(), VoiceError>;

    /// Queue `text` after anything already being spoken
    fn speak(&self, text: &str) -> Result<(), VoiceError>;

    /// Interrupt current speech and say `text` now
    fn speak_urgent(&self, text: &str) -> Result<(), VoiceError>;

    /// Stop speaking and drop queued text
    fn stop(&self);

    /// Speaking rate multiplier, 1.0 is normal
    fn set_rate(&self, rate: f32);

    /// Volume in [0, 1]
    fn set_volume(&self, volume: f32);

    /// Release every engine resource
    async fn shutdown(&self);
}
