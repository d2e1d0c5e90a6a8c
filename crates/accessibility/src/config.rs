//! Accessibility mode configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessibilityConfig {
    /// Spoken once when voice operation starts
    pub welcome_phrase: String,

    /// Speech rate multiplier
    pub speech_rate: f32,

    /// Speech volume (0-1)
    pub speech_volume: f32,
}

impl Default for AccessibilityConfig {
    fn default() -> Self {
        Self {
            welcome_phrase: "Modo de accesibilidad activado. Diga el nombre del servicio que necesita.".into(),
            speech_rate: 1.0,
            speech_volume: 1.0,
        }
    }
}
