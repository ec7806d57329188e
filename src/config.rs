use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable and secret-store key holding the Gemini API key
pub const API_KEY_NAME: &str = "GOOGLE_API_KEY";

const CONFIG_FILE: &str = "config.json";
const SECRETS_FILE: &str = "secrets.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Chưa cấu hình API Key. Set GOOGLE_API_KEY or add it to {}", .0.display())]
    MissingApiKey(PathBuf),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown language code {0} in translate; known codes: {}", known_codes())]
    UnknownLanguage(String),
}

/// A language the interpreter mode can translate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
}

pub const LANGUAGES: &[Language] = &[
    Language { code: "vi-VN", name: "Tiếng Việt" },
    Language { code: "en-US", name: "English (US)" },
    Language { code: "ja-JP", name: "日本語" },
    Language { code: "ko-KR", name: "한국어" },
    Language { code: "fr-FR", name: "Français" },
    Language { code: "zh-CN", name: "中文" },
];

pub fn find_language(code: &str) -> Option<&'static Language> {
    LANGUAGES.iter().find(|lang| lang.code.eq_ignore_ascii_case(code))
}

fn known_codes() -> String {
    LANGUAGES
        .iter()
        .map(|lang| lang.code)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Interpreter mode: every message is translated between two languages
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TranslatePair {
    pub from: String,
    pub to: String,
}

impl TranslatePair {
    fn validate(&self) -> Result<(), ConfigError> {
        for code in [&self.from, &self.to] {
            if find_language(code).is_none() {
                return Err(ConfigError::UnknownLanguage(code.clone()));
            }
        }
        Ok(())
    }

    pub fn instruction(&self) -> String {
        let a = find_language(&self.from).map_or(self.from.as_str(), |lang| lang.name);
        let b = find_language(&self.to).map_or(self.to.as_str(), |lang| lang.name);
        format!(
            "You are a professional simultaneous interpreter. \
             Translate continuously between {a} and {b}. \
             If you receive {a}, translate to {b}. \
             If you receive {b}, translate to {a}. \
             Write ONLY the translation. Do not add conversational filler unless the user asks you a direct question. \
             Keep the output professional and accurate."
        )
    }
}

/// Sampling parameters sent with every request. Fixed for the whole run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.95,
            top_k: 64,
            max_output_tokens: 8192,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub model: String,
    pub base_url: String,
    pub generation: GenerationConfig,
    pub system_instruction: Option<String>,
    pub translate: Option<TranslatePair>,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            generation: GenerationConfig::default(),
            system_instruction: None,
            translate: None,
            request_timeout_secs: 120,
            connect_timeout_secs: 10,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
struct Secrets {
    #[serde(rename = "GOOGLE_API_KEY")]
    google_api_key: Option<String>,
}

impl Config {
    /// Load `config.json` from `dir`. A missing file means defaults.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = read(&path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|source| ConfigError::Parse { path, source })?;

        if let Some(pair) = &config.translate {
            pair.validate()?;
        }
        Ok(config)
    }

    /// System instruction sent with every request: the interpreter prompt when
    /// `translate` is set, followed by the operator's own `system_instruction`.
    pub fn instruction(&self) -> Option<String> {
        let interpreter = self.translate.as_ref().map(TranslatePair::instruction);
        match (interpreter, self.system_instruction.as_deref()) {
            (Some(interpreter), Some(extra)) => Some(format!("{}\n\n{}", interpreter, extra)),
            (Some(interpreter), None) => Some(interpreter),
            (None, extra) => extra.map(str::to_string),
        }
    }

    /// Default location: `~/.config/vttrans` (platform equivalent)
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("vttrans"))
    }
}

/// Resolve the API key: `from_env` (the `GOOGLE_API_KEY` variable) first, then
/// the secret store file.
///
/// Blank values count as absent.
pub fn resolve_api_key(dir: &Path, from_env: Option<String>) -> Result<String, ConfigError> {
    let secrets_path = dir.join(SECRETS_FILE);

    if let Some(key) = non_blank(from_env) {
        return Ok(key);
    }

    let secrets = if secrets_path.exists() {
        let content = read(&secrets_path)?;
        serde_json::from_str::<Secrets>(&content).map_err(|source| ConfigError::Parse {
            path: secrets_path.clone(),
            source,
        })?
    } else {
        Secrets::default()
    };

    non_blank(secrets.google_api_key).ok_or(ConfigError::MissingApiKey(secrets_path))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.generation.top_k, 64);
        assert_eq!(config.generation.max_output_tokens, 8192);
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"model": "gemini-2.0-flash", "generation": {"temperature": 0.2}}"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.generation.temperature, 0.2);
        assert_eq!(config.generation.top_p, 0.95);
        assert_eq!(config.request_timeout_secs, 120);
    }

    #[test]
    fn test_malformed_config_is_parse_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{ not json").unwrap();

        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_translate_builds_interpreter_instruction() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"translate": {"from": "vi-VN", "to": "ja-JP"}, "system_instruction": "Be brief."}"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        let instruction = config.instruction().unwrap();
        assert!(instruction.starts_with("You are a professional simultaneous interpreter."));
        assert!(instruction.contains("If you receive Tiếng Việt, translate to 日本語."));
        assert!(instruction.contains("If you receive 日本語, translate to Tiếng Việt."));
        assert!(instruction.ends_with("\n\nBe brief."));
    }

    #[test]
    fn test_instruction_without_translate_is_operator_text() {
        assert_eq!(Config::default().instruction(), None);

        let config = Config {
            system_instruction: Some("Answer in Vietnamese.".to_string()),
            ..Config::default()
        };
        assert_eq!(config.instruction().as_deref(), Some("Answer in Vietnamese."));
    }

    #[test]
    fn test_unknown_translate_language_is_rejected() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"translate": {"from": "vi-VN", "to": "xx-XX"}}"#,
        )
        .unwrap();

        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownLanguage(ref code) if code == "xx-XX"));
        assert!(err.to_string().contains("vi-VN, en-US"));
    }

    #[test]
    fn test_api_key_absent_everywhere() {
        let dir = tempdir().unwrap();
        let err = resolve_api_key(dir.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey(_)));
        assert!(err.to_string().starts_with("Chưa cấu hình API Key."));
    }

    #[test]
    fn test_api_key_from_secrets_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(SECRETS_FILE),
            r#"{"GOOGLE_API_KEY": "from-file"}"#,
        )
        .unwrap();

        assert_eq!(resolve_api_key(dir.path(), None).unwrap(), "from-file");
    }

    #[test]
    fn test_env_key_wins_over_secrets_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(SECRETS_FILE),
            r#"{"GOOGLE_API_KEY": "from-file"}"#,
        )
        .unwrap();

        let key = resolve_api_key(dir.path(), Some("from-env".to_string())).unwrap();
        assert_eq!(key, "from-env");
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(SECRETS_FILE), r#"{"GOOGLE_API_KEY": "  "}"#).unwrap();

        let err = resolve_api_key(dir.path(), Some(String::new())).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey(_)));
    }
}
