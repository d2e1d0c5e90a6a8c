//! Shared voice session
//!
//! One session lives for as long as accessibility mode is on. Screens attach
//! their command sets while they are shown and detach them when they leave;
//! the session itself is not recreated per screen.

use crate::commands::{CommandAction, CommandTable, NumberHandler};
use crate::engine::{RecognitionEngine, SynthesisEngine};
use crate::grammar::vocabulary;
use crate::normalize::normalize;
use crate::numbers::extract_digits;
use crate::VoiceError;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Which engines came up during [`VoiceSession::initialize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReadiness {
    pub recognition: bool,
    pub speech: bool,
}

/// What one utterance triggered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A registered keyword matched and its action ran
    Command(String),
    /// No keyword matched; the number handler got these digits
    Number(String),
    /// Nothing ran
    Unmatched,
    /// Session is not active
    Inactive,
}

#[derive(Default)]
struct SessionState {
    active: bool,
    commands: CommandTable,
    number_handler: Option<NumberHandler>,
    grammar_words: BTreeSet<String>,
    worker: Option<JoinHandle<()>>,
}

/// Voice session over one recognizer and one synthesizer
pub struct VoiceSession {
    recognizer: Arc<dyn RecognitionEngine>,
    synthesizer: Arc<dyn SynthesisEngine>,
    recognition_ready: AtomicBool,
    speech_ready: AtomicBool,
    state: Arc<Mutex<SessionState>>,
}

impl VoiceSession {
    /// Create a session; engines stay uninitialized until [`initialize`](Self::initialize)
    pub fn new(recognizer: Arc<dyn RecognitionEngine>, synthesizer: Arc<dyn SynthesisEngine>) -> Self {
        Self {
            recognizer,
            synthesizer,
            recognition_ready: AtomicBool::new(false),
            speech_ready: AtomicBool::new(false),
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    /// Bring up both engines. Each one failing only disables its own modality.
    pub async fn initialize(&self) -> SessionReadiness {
        match self.recognizer.init().await {
            Ok(()) => {
                info!("Recognition engine '{}' ready", self.recognizer.name());
                self.recognition_ready.store(true, Ordering::SeqCst);
            }
            Err(e) => warn!("Recognition engine '{}' unavailable: {}", self.recognizer.name(), e),
        }

        match self.synthesizer.init().await {
            Ok(()) => {
                info!("Synthesis engine '{}' ready", self.synthesizer.name());
                self.speech_ready.store(true, Ordering::SeqCst);
            }
            Err(e) => warn!("Synthesis engine '{}' unavailable: {}", self.synthesizer.name(), e),
        }

        self.readiness()
    }

    pub fn readiness(&self) -> SessionReadiness {
        SessionReadiness {
            recognition: self.is_ready(),
            speech: self.is_speech_ready(),
        }
    }

    /// Recognition engine initialized
    pub fn is_ready(&self) -> bool {
        self.recognition_ready.load(Ordering::SeqCst)
    }

    /// Synthesis engine initialized
    pub fn is_speech_ready(&self) -> bool {
        self.speech_ready.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.lock_state().active
    }

    /// Start listening and dispatching.
    ///
    /// Returns true when the session is (already) active, false when the
    /// recognizer never became ready or refused to start.
    pub fn activate(&self) -> bool {
        if !self.is_ready() {
            warn!("Voice session activation refused: recognizer not ready");
            return false;
        }

        let mut state = self.lock_state();
        if state.active {
            return true;
        }

        let (sink, utterances) = mpsc::unbounded_channel();
        if let Err(e) = self.recognizer.start_listening(sink) {
            warn!("Recognizer '{}' failed to start: {}", self.recognizer.name(), e);
            return false;
        }

        state.worker = Some(tokio::spawn(dispatch_loop(Arc::clone(&self.state), utterances)));
        state.active = true;
        info!("Voice session active");
        true
    }

    /// Stop listening and drop every screen-level registration
    pub fn deactivate(&self) {
        let worker = {
            let mut state = self.lock_state();
            if !state.active {
                return;
            }
            state.active = false;
            state.commands.clear();
            state.number_handler = None;
            state.grammar_words.clear();
            state.worker.take()
        };

        self.recognizer.stop_listening();
        if let Err(e) = self.recognizer.set_vocabulary(None) {
            debug!("Could not lift vocabulary constraint: {}", e);
        }
        if let Some(worker) = worker {
            worker.abort();
        }
        info!("Voice session inactive");
    }

    /// Register comma-separated keywords as aliases of one action
    pub fn register_command<F>(&self, keyword_csv: &str, action: F) -> usize
    where
        F: Fn() + Send + Sync + 'static,
    {
        let action: CommandAction = Arc::new(action);
        let stored = self.lock_state().commands.register(keyword_csv, action);
        debug!("Registered {} keywords from '{}'", stored, keyword_csv);
        stored
    }

    /// Handler for dictated digits when no keyword matches
    pub fn set_number_handler<F>(&self, handler: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.lock_state().number_handler = Some(Arc::new(handler));
    }

    pub fn clear_number_handler(&self) {
        self.lock_state().number_handler = None;
    }

    pub fn has_number_handler(&self) -> bool {
        self.lock_state().number_handler.is_some()
    }

    /// Number of registered keywords
    pub fn command_count(&self) -> usize {
        self.lock_state().commands.len()
    }

    /// Current vocabulary constraint; empty means unconstrained
    pub fn grammar_words(&self) -> Vec<String> {
        self.lock_state().grammar_words.iter().cloned().collect()
    }

    /// Constrain recognition to the words of the registered keywords.
    /// Returns the vocabulary size.
    pub fn enable_grammar(&self) -> Result<usize, VoiceError> {
        if !self.is_ready() {
            return Err(VoiceError::NotReady);
        }

        let mut state = self.lock_state();
        let words = vocabulary(&state.commands, state.number_handler.is_some());
        let list: Vec<String> = words.iter().cloned().collect();
        if list.is_empty() {
            // Nothing registered: an empty vocabulary would match no speech at all
            self.recognizer.set_vocabulary(None)?;
            debug!("Grammar requested with no keywords, recognition stays unconstrained");
        } else {
            self.recognizer.set_vocabulary(Some(&list))?;
            info!("Grammar constrained to {} words", list.len());
        }
        state.grammar_words = words;
        Ok(list.len())
    }

    /// Return to unconstrained recognition
    pub fn disable_grammar(&self) {
        self.lock_state().grammar_words.clear();
        if let Err(e) = self.recognizer.set_vocabulary(None) {
            warn!("Could not lift vocabulary constraint: {}", e);
        }
    }

    /// Drop every command, the number handler and the grammar constraint
    pub fn clear_commands(&self) {
        {
            let mut state = self.lock_state();
            state.commands.clear();
            state.number_handler = None;
        }
        self.disable_grammar();
    }

    /// Run one utterance through the command table
    pub fn handle_utterance(&self, text: &str) -> DispatchOutcome {
        dispatch(&self.state, text)
    }

    /// Say `text` after current speech. Silently skipped without a synthesizer.
    pub fn speak(&self, text: &str) {
        if !self.is_speech_ready() {
            return;
        }
        if let Err(e) = self.synthesizer.speak(text) {
            warn!("Speech failed: {}", e);
        }
    }

    /// Interrupt current speech and say `text`
    pub fn speak_urgent(&self, text: &str) {
        if !self.is_speech_ready() {
            return;
        }
        if let Err(e) = self.synthesizer.speak_urgent(text) {
            warn!("Urgent speech failed: {}", e);
        }
    }

    pub fn stop_speaking(&self) {
        if self.is_speech_ready() {
            self.synthesizer.stop();
        }
    }

    pub fn set_speech_rate(&self, rate: f32) {
        self.synthesizer.set_rate(rate);
    }

    pub fn set_speech_volume(&self, volume: f32) {
        self.synthesizer.set_volume(volume.clamp(0.0, 1.0));
    }

    /// Deactivate and release both engines. The session cannot be reused.
    pub async fn shutdown(&self) {
        self.deactivate();
        self.stop_speaking();

        if self.recognition_ready.swap(false, Ordering::SeqCst) {
            self.recognizer.shutdown().await;
        }
        if self.speech_ready.swap(false, Ordering::SeqCst) {
            self.synthesizer.shutdown().await;
        }
        info!("Voice session shut down");
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    // Actions run outside the lock, so poisoning only follows a panic inside
    // this module; the state itself stays consistent.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Single consumer: utterances are dispatched strictly one after another
async fn dispatch_loop(state: Arc<Mutex<SessionState>>, mut utterances: mpsc::UnboundedReceiver<String>) {
    while let Some(text) = utterances.recv().await {
        let outcome = dispatch(&state, &text);
        debug!("Utterance '{}' -> {:?}", text, outcome);
    }
    debug!("Dispatch loop finished");
}

fn dispatch(state: &Mutex<SessionState>, text: &str) -> DispatchOutcome {
    let normalized = normalize(text);

    enum Target {
        Command(String, CommandAction),
        Number(String, NumberHandler),
    }

    let target = {
        let state = lock(state);
        if !state.active {
            return DispatchOutcome::Inactive;
        }

        match state.commands.find(&normalized) {
            Some((keyword, action)) => Target::Command(keyword.to_string(), Arc::clone(action)),
            None => match (&state.number_handler, extract_digits(&normalized)) {
                (Some(handler), Some(digits)) => Target::Number(digits, Arc::clone(handler)),
                _ => return DispatchOutcome::Unmatched,
            },
        }
    };

    match target {
        Target::Command(keyword, action) => {
            info!("Voice command '{}'", keyword);
            action();
            DispatchOutcome::Command(keyword)
        }
        Target::Number(digits, handler) => {
            info!("Dictated digits '{}'", digits);
            handler(digits.clone());
            DispatchOutcome::Number(digits)
        }
    }
}
