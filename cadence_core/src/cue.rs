//! Audio and speech cues.
//!
//! The engine only sees the `CueEmitter` trait. Implementations are
//! fire-and-forget: they must not block and must swallow their own failures.

use serde::{Deserialize, Serialize};

/// Oscillator shape for a tone cue
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// How phase changes are announced
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CueMode {
    #[default]
    Beep,
    Voice,
    Mute,
}

impl CueMode {
    /// Rotation order: beep -> voice -> mute -> beep
    pub fn next(self) -> Self {
        match self {
            CueMode::Beep => CueMode::Voice,
            CueMode::Voice => CueMode::Mute,
            CueMode::Mute => CueMode::Beep,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "beep" => Some(CueMode::Beep),
            "voice" => Some(CueMode::Voice),
            "mute" => Some(CueMode::Mute),
            _ => None,
        }
    }
}

/// Audio/speech capability injected into the playback engine
pub trait CueEmitter {
    fn play_tone(&mut self, frequency_hz: f32, waveform: Waveform, duration_seconds: f32);
    fn speak(&mut self, text: &str);
}

/// Emitter for platforms without audio; every cue is dropped
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentCues;

impl CueEmitter for SilentCues {
    fn play_tone(&mut self, _frequency_hz: f32, _waveform: Waveform, _duration_seconds: f32) {}
    fn speak(&mut self, _text: &str) {}
}

impl<E: CueEmitter + ?Sized> CueEmitter for &mut E {
    fn play_tone(&mut self, frequency_hz: f32, waveform: Waveform, duration_seconds: f32) {
        (**self).play_tone(frequency_hz, waveform, duration_seconds)
    }

    fn speak(&mut self, text: &str) {
        (**self).speak(text)
    }
}

/// Tones and phrases used by the engine
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CueSettings {
    #[serde(default = "default_countdown_window")]
    pub countdown_window: u32,

    #[serde(default = "default_countdown_tone_hz")]
    pub countdown_tone_hz: f32,

    #[serde(default = "default_countdown_tone_seconds")]
    pub countdown_tone_seconds: f32,

    #[serde(default = "default_transition_tone_hz")]
    pub transition_tone_hz: f32,

    #[serde(default = "default_transition_tone_seconds")]
    pub transition_tone_seconds: f32,

    #[serde(default = "default_get_ready_phrase")]
    pub get_ready_phrase: String,
}

impl Default for CueSettings {
    fn default() -> Self {
        Self {
            countdown_window: default_countdown_window(),
            countdown_tone_hz: default_countdown_tone_hz(),
            countdown_tone_seconds: default_countdown_tone_seconds(),
            transition_tone_hz: default_transition_tone_hz(),
            transition_tone_seconds: default_transition_tone_seconds(),
            get_ready_phrase: default_get_ready_phrase(),
        }
    }
}

fn default_countdown_window() -> u32 {
    3
}

fn default_countdown_tone_hz() -> f32 {
    440.0
}

fn default_countdown_tone_seconds() -> f32 {
    0.1
}

fn default_transition_tone_hz() -> f32 {
    880.0
}

fn default_transition_tone_seconds() -> f32 {
    0.3
}

fn default_get_ready_phrase() -> String {
    "Get ready".into()
}

impl CueSettings {
    /// Countdown cue for a remaining-seconds value inside the window
    ///
    /// Beep mode sounds one tone per second. Voice mode says the get-ready
    /// phrase once, when the window opens. Mute does nothing.
    pub fn countdown(&self, mode: CueMode, remaining: u32, emitter: &mut impl CueEmitter) {
        if remaining == 0 || remaining > self.countdown_window {
            return;
        }
        match mode {
            CueMode::Beep => emitter.play_tone(
                self.countdown_tone_hz,
                Waveform::Sine,
                self.countdown_tone_seconds,
            ),
            CueMode::Voice if remaining == self.countdown_window => {
                emitter.speak(&self.get_ready_phrase)
            }
            CueMode::Voice | CueMode::Mute => {}
        }
    }

    /// Announce the phase that just started
    pub fn transition(&self, mode: CueMode, label: &str, emitter: &mut impl CueEmitter) {
        match mode {
            CueMode::Beep => emitter.play_tone(
                self.transition_tone_hz,
                Waveform::Square,
                self.transition_tone_seconds,
            ),
            CueMode::Voice => emitter.speak(label),
            CueMode::Mute => {}
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A single cue captured by `RecordingCues`
    #[derive(Clone, Debug, PartialEq)]
    pub enum Cue {
        Tone(f32, Waveform),
        Speech(String),
    }

    /// Emitter that records every cue for assertions
    #[derive(Debug, Default)]
    pub struct RecordingCues {
        pub cues: Vec<Cue>,
    }

    impl RecordingCues {
        pub fn tones_at(&self, hz: f32) -> usize {
            self.cues
                .iter()
                .filter(|c| matches!(c, Cue::Tone(f, _) if *f == hz))
                .count()
        }

        pub fn speech(&self) -> Vec<&str> {
            self.cues
                .iter()
                .filter_map(|c| match c {
                    Cue::Speech(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect()
        }
    }

    impl CueEmitter for RecordingCues {
        fn play_tone(&mut self, frequency_hz: f32, waveform: Waveform, _duration_seconds: f32) {
            self.cues.push(Cue::Tone(frequency_hz, waveform));
        }

        fn speak(&mut self, text: &str) {
            self.cues.push(Cue::Speech(text.to_string()));
        }
    }
}
