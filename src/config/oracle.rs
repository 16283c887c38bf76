// src/config/oracle.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_provider() -> String {
    "openai".to_string()
}
fn default_classify_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_analyze_model() -> String {
    "gpt-4".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_classify_max_tokens() -> u32 {
    500
}
fn default_analyze_max_tokens() -> u32 {
    3000
}
fn default_api_key() -> String {
    "ENV".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// "openai" | "mock" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model used by the coarse selection stage.
    #[serde(default = "default_classify_model")]
    pub classify_model: String,
    /// Model used by the deep analysis stage.
    #[serde(default = "default_analyze_model")]
    pub analyze_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_classify_max_tokens")]
    pub classify_max_tokens: u32,
    #[serde(default = "default_analyze_max_tokens")]
    pub analyze_max_tokens: u32,
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            classify_model: default_classify_model(),
            analyze_model: default_analyze_model(),
            temperature: default_temperature(),
            classify_max_tokens: default_classify_max_tokens(),
            analyze_max_tokens: default_analyze_max_tokens(),
            api_key: default_api_key(),
        }
    }
}

impl OracleConfig {
    /// Normalize provider and clamp sampling parameters into their valid ranges.
    pub fn sanitize(&mut self) {
        self.provider = self.provider.trim().to_lowercase();
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            self.temperature = default_temperature();
        }
        if self.classify_max_tokens == 0 {
            self.classify_max_tokens = default_classify_max_tokens();
        }
        if self.analyze_max_tokens == 0 {
            self.analyze_max_tokens = default_analyze_max_tokens();
        }
    }

    /// Resolve the API key, reading the environment when configured as "ENV".
    pub fn resolve_api_key(&self) -> anyhow::Result<String> {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            return match self.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var")),
                "mock" => Ok(String::new()),
                other => anyhow::bail!("Unsupported oracle provider in config: {other}"),
            };
        }
        Ok(self.api_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_normalizes_provider_and_limits() {
        let mut cfg = OracleConfig {
            provider: " OpenAI ".into(),
            temperature: 9.0,
            classify_max_tokens: 0,
            ..Default::default()
        };
        cfg.sanitize();
        assert_eq!(cfg.provider, "openai");
        assert!((cfg.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(cfg.classify_max_tokens, 500);
    }

    #[test]
    fn literal_key_is_used_verbatim() {
        let cfg = OracleConfig {
            api_key: "sk-test".into(),
            ..Default::default()
        };
        assert_eq!(cfg.resolve_api_key().unwrap(), "sk-test");
    }
}
