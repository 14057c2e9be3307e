//! Configuration management for the vademecum server.
//!
//! Everything comes from environment variables (a `.env` file is loaded
//! first by `main`). API keys are optional: without them the corresponding
//! features answer with a configuration error instead of calling out.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub spreadsheet_id: String,
    pub google_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub sheets_base_url: String,
    pub gemini_base_url: String,
    pub tts_url: String,
    pub default_source: String,
    pub initial_articles: usize,
    pub player_command: String,
    pub local_tts_command: String,
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "127.0.0.1:3000".to_string(),
            data_dir: PathBuf::from(".vademecum_db"),
            spreadsheet_id: String::new(),
            google_api_key: None,
            gemini_api_key: None,
            gemini_model: "gemini-1.5-flash".to_string(),
            sheets_base_url: "https://sheets.googleapis.com".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            tts_url: "https://texttospeech.googleapis.com/v1/text:synthesize".to_string(),
            default_source: "Sheet1".to_string(),
            initial_articles: 10,
            player_command: "mpv --no-video --really-quiet".to_string(),
            local_tts_command: "espeak-ng -v pt-br".to_string(),
            http_timeout_secs: 20,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        let google_api_key = non_empty_var("GOOGLE_API_KEY");

        Config {
            bind_addr: env::var("VADEMECUM_BIND").unwrap_or(defaults.bind_addr),
            data_dir: env::var("VADEMECUM_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            spreadsheet_id: env::var("VADEMECUM_SPREADSHEET_ID")
                .unwrap_or(defaults.spreadsheet_id),
            // The generative API accepts the same project key when no dedicated one is set.
            gemini_api_key: non_empty_var("GEMINI_API_KEY").or_else(|| google_api_key.clone()),
            google_api_key,
            gemini_model: env::var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            sheets_base_url: env::var("VADEMECUM_SHEETS_URL").unwrap_or(defaults.sheets_base_url),
            gemini_base_url: env::var("VADEMECUM_GEMINI_URL").unwrap_or(defaults.gemini_base_url),
            tts_url: env::var("VADEMECUM_TTS_URL").unwrap_or(defaults.tts_url),
            default_source: env::var("VADEMECUM_DEFAULT_SOURCE")
                .unwrap_or(defaults.default_source),
            initial_articles: env::var("VADEMECUM_INITIAL_ARTICLES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.initial_articles),
            player_command: env::var("VADEMECUM_PLAYER").unwrap_or(defaults.player_command),
            local_tts_command: env::var("VADEMECUM_LOCAL_TTS")
                .unwrap_or(defaults.local_tts_command),
            http_timeout_secs: env::var("VADEMECUM_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_timeout_secs),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Split a configured command line into program and arguments.
pub fn split_command(command: &str) -> Option<(String, Vec<String>)> {
    let mut parts = command.split_whitespace().map(|s| s.to_string());
    let program = parts.next()?;
    Some((program, parts.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_command() {
        let (program, args) = split_command("mpv --no-video  --really-quiet").unwrap();
        assert_eq!(program, "mpv");
        assert_eq!(args, vec!["--no-video", "--really-quiet"]);
        assert!(split_command("   ").is_none());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.default_source, "Sheet1");
        assert_eq!(config.initial_articles, 10);
        assert!(config.google_api_key.is_none());
    }
}
