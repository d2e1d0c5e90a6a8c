//! Voice Command Engine
//!
//! Replaces the touchscreen with a constrained spoken vocabulary:
//! - Speech session lifecycle over pluggable recognition/synthesis engines
//! - Keyword-to-action registry with alias support
//! - Sequential dispatch of recognized utterances
//! - Numeric dictation ("uno siete cero" -> "170")
//! - Grammar constraint built from the registered keywords
//! - Fuzzy keyword generation for arbitrary business labels

pub mod backends;
pub mod commands;
pub mod engine;
pub mod grammar;
pub mod keywords;
pub mod normalize;
pub mod numbers;
pub mod session;

pub use commands::{CommandAction, CommandTable, NumberHandler};
pub use engine::{RecognitionEngine, SynthesisEngine, UtteranceSink};
pub use keywords::{generate_keywords, keyword_csv};
pub use normalize::normalize;
pub use session::{DispatchOutcome, SessionReadiness, VoiceSession};

use thiserror::Error;

/// Voice engine error types
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Engine initialization failed: {0}")]
    EngineInit(String),

    #[error("Voice session not ready")]
    NotReady,

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),
}
