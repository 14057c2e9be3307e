//! Text-to-speech for articles.
//!
//! Remote synthesis returns an MP3 clip; playback goes through an
//! [`AudioOutput`] owned by a [`PlaybackSession`], which guarantees that only
//! one clip plays at a time. When remote synthesis fails the session falls
//! back to a local speech synthesizer.

use std::fs;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use regex::{Captures, Regex};
use serde_json::{json, Value};

use crate::config::{split_command, Config};
use crate::error::{AppError, Result};

// ============================================================================
// Text Preparation
// ============================================================================

fn roman_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(X|IX|VIII|VII|VI|V|IV|III|II|I)\b").expect("roman numeral pattern")
    })
}

fn abbreviation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:(art|inc|pág|n|min|rel|proc|cf)\.|(STF|STJ|TST)\b)")
            .expect("abbreviation pattern")
    })
}

fn emoji_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"[\x{1F600}-\x{1F64F}\x{1F300}-\x{1F5FF}\x{1F680}-\x{1F6FF}\x{2600}-\x{26FF}\x{2700}-\x{27BF}\x{1F900}-\x{1F9FF}\x{1F1E0}-\x{1F1FF}\x{1F700}-\x{1F8FF}\x{1FA00}-\x{1FAFF}]",
        )
        .expect("emoji pattern")
    })
}

fn roman_ordinal(numeral: &str) -> &'static str {
    match numeral {
        "I" => "primeiro",
        "II" => "segundo",
        "III" => "terceiro",
        "IV" => "quarto",
        "V" => "quinto",
        "VI" => "sexto",
        "VII" => "sétimo",
        "VIII" => "oitavo",
        "IX" => "nono",
        _ => "décimo",
    }
}

fn expand_abbreviation(abbrev: &str) -> &'static str {
    match abbrev {
        "art" => "artigo",
        "inc" => "inciso",
        "pág" => "página",
        "n" => "número",
        "min" => "ministro",
        "rel" => "relator",
        "proc" => "processo",
        "cf" => "conforme",
        "STF" => "Supremo Tribunal Federal",
        "STJ" => "Superior Tribunal de Justiça",
        _ => "Tribunal Superior do Trabalho",
    }
}

/// Rewrite article text so a speech synthesizer reads it naturally: Roman
/// numerals I to X become ordinals, legal abbreviations are spelled out and
/// emoji are dropped.
pub fn prepare_for_speech(text: &str) -> String {
    let text = roman_regex().replace_all(text, |caps: &Captures| roman_ordinal(&caps[1]).to_string());
    let text = abbreviation_regex().replace_all(&text, |caps: &Captures| {
        let abbrev = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()).unwrap_or("");
        expand_abbreviation(abbrev).to_string()
    });
    emoji_regex().replace_all(&text, "").into_owned()
}

// ============================================================================
// Remote Synthesis
// ============================================================================

pub struct SpeechClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl SpeechClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            url: config.tts_url.clone(),
            api_key: config.google_api_key.clone(),
        })
    }

    /// Synthesize `text` and return the base64-encoded MP3 clip.
    pub async fn synthesize(&self, text: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("GOOGLE_API_KEY não definido".to_string()))?;

        let body = json!({
            "input": { "text": text },
            "voice": {
                "languageCode": "pt-BR",
                "name": "pt-BR-Wavenet-A",
                "ssmlGender": "FEMALE"
            },
            "audioConfig": {
                "audioEncoding": "MP3",
                "speakingRate": 0.95,
                "pitch": 0,
                "volumeGainDb": 0,
                "effectsProfileId": ["small-bluetooth-speaker-class-device"]
            }
        });

        let response = self
            .http
            .post(&self.url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream(format!("text:synthesize returned {}", status)));
        }

        let json: Value = response.json().await?;
        json.get("audioContent")
            .and_then(|a| a.as_str())
            .filter(|a| !a.is_empty())
            .map(|a| a.to_string())
            .ok_or_else(|| AppError::Upstream("synthesis returned no audio".to_string()))
    }
}

// ============================================================================
// Playback
// ============================================================================

/// Where clips and local speech actually come out.
pub trait AudioOutput {
    fn play(&mut self, clip: &[u8]) -> Result<()>;
    fn stop(&mut self);
    fn speak_locally(&mut self, text: &str) -> Result<()>;
    /// Whether something started by this output is still sounding.
    fn is_active(&mut self) -> bool;
}

/// Plays through external programs: a media player for synthesized clips and
/// a command-line speech synthesizer for the local fallback.
pub struct CommandOutput {
    player: String,
    local_tts: String,
    clip_path: PathBuf,
    child: Option<Child>,
}

impl CommandOutput {
    pub fn new(config: &Config) -> Self {
        Self {
            player: config.player_command.clone(),
            local_tts: config.local_tts_command.clone(),
            clip_path: config.data_dir.join("playback.mp3"),
            child: None,
        }
    }

    fn spawn(&mut self, command_line: &str, last_arg: &str) -> Result<()> {
        let (program, args) = split_command(command_line)
            .ok_or_else(|| AppError::Config("comando de áudio vazio".to_string()))?;
        let child = Command::new(program)
            .args(args)
            .arg(last_arg)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        self.child = Some(child);
        Ok(())
    }
}

impl AudioOutput for CommandOutput {
    fn play(&mut self, clip: &[u8]) -> Result<()> {
        if let Some(parent) = self.clip_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.clip_path, clip)?;
        let path = self.clip_path.to_string_lossy().into_owned();
        let player = self.player.clone();
        self.spawn(&player, &path)
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                tracing::debug!(error = %e, "player already exited");
            }
            let _ = child.wait();
        }
    }

    fn speak_locally(&mut self, text: &str) -> Result<()> {
        let local_tts = self.local_tts.clone();
        self.spawn(&local_tts, text)
    }

    fn is_active(&mut self) -> bool {
        match self.child.as_mut().map(|c| c.try_wait()) {
            Some(Ok(None)) => true,
            Some(_) => {
                self.child = None;
                false
            }
            None => false,
        }
    }
}

/// One listening session: at most one clip plays at a time, and the session
/// remembers which article it belongs to.
pub struct PlaybackSession<O: AudioOutput> {
    output: O,
    now_playing: Option<String>,
}

impl<O: AudioOutput> PlaybackSession<O> {
    pub fn new(output: O) -> Self {
        Self {
            output,
            now_playing: None,
        }
    }

    /// Stop whatever is playing, then play the base64 clip for `article`.
    pub fn play(&mut self, article: &str, audio_base64: &str) -> Result<()> {
        self.stop();
        let clip = STANDARD
            .decode(audio_base64.trim())
            .map_err(|e| AppError::Upstream(format!("invalid audio clip: {}", e)))?;
        self.output.play(&clip)?;
        self.now_playing = Some(article.to_string());
        tracing::info!(article, bytes = clip.len(), "playing article audio");
        Ok(())
    }

    pub fn speak_locally(&mut self, article: &str, text: &str) -> Result<()> {
        self.stop();
        self.output.speak_locally(text)?;
        self.now_playing = Some(article.to_string());
        tracing::info!(article, "speaking article with local synthesizer");
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(article) = self.now_playing.take() {
            tracing::debug!(article = %article, "stopping playback");
        }
        self.output.stop();
    }

    /// Article currently sounding; cleared once the output has finished.
    pub fn now_playing(&mut self) -> Option<&str> {
        if self.now_playing.is_some() && !self.output.is_active() {
            self.now_playing = None;
        }
        self.now_playing.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeOutput {
        events: Vec<String>,
        active: bool,
    }

    impl AudioOutput for FakeOutput {
        fn play(&mut self, clip: &[u8]) -> Result<()> {
            self.events.push(format!("play {}", clip.len()));
            self.active = true;
            Ok(())
        }

        fn stop(&mut self) {
            self.events.push("stop".to_string());
            self.active = false;
        }

        fn speak_locally(&mut self, text: &str) -> Result<()> {
            self.events.push(format!("speak {}", text));
            self.active = true;
            Ok(())
        }

        fn is_active(&mut self) -> bool {
            self.active
        }
    }

    #[test]
    fn test_prepare_roman_numerals_and_abbreviations() {
        let text = prepare_for_speech("Conforme art. 5, inciso IV, decidido pelo STF.");
        assert_eq!(
            text,
            "Conforme artigo 5, inciso quarto, decidido pelo Supremo Tribunal Federal."
        );
    }

    #[test]
    fn test_prepare_leaves_words_alone() {
        // Numerals inside words and capitalised abbreviations are untouched.
        let text = prepare_for_speech("VIVA a CIVIL; Art. 1");
        assert_eq!(text, "VIVA a CIVIL; Art. 1");
    }

    #[test]
    fn test_prepare_strips_emoji() {
        assert_eq!(prepare_for_speech("Lei 📜 nova 🚀"), "Lei  nova ");
    }

    #[test]
    fn test_play_stops_previous_clip() {
        let mut session = PlaybackSession::new(FakeOutput::default());
        session.play("5", &STANDARD.encode(b"abc")).unwrap();
        assert_eq!(session.now_playing(), Some("5"));

        session.play("6", &STANDARD.encode(b"abcd")).unwrap();
        assert_eq!(session.now_playing(), Some("6"));
        assert_eq!(
            session.output.events,
            vec!["stop", "play 3", "stop", "play 4"]
        );
    }

    #[test]
    fn test_finished_clip_clears_now_playing() {
        let mut session = PlaybackSession::new(FakeOutput::default());
        session.play("5", &STANDARD.encode(b"abc")).unwrap();
        session.output.active = false;
        assert_eq!(session.now_playing(), None);
    }

    #[test]
    fn test_invalid_clip_is_an_error() {
        let mut session = PlaybackSession::new(FakeOutput::default());
        assert!(session.play("5", "not base64!!").is_err());
        assert_eq!(session.now_playing(), None);
    }

    #[test]
    fn test_local_fallback_and_stop() {
        let mut session = PlaybackSession::new(FakeOutput::default());
        session.speak_locally("9", "texto").unwrap();
        assert_eq!(session.now_playing(), Some("9"));
        session.stop();
        assert_eq!(session.now_playing(), None);
        assert_eq!(session.output.events, vec!["stop", "speak texto", "stop"]);
    }
}
