use std::env;

pub const DEMO_KEY: &str = "DEMO_KEY";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub port: u16,
}

impl Config {
    /// Reads settings from the process environment (load `.env` first if you want it honoured).
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api_key: lookup("GEMINI_API_KEY").unwrap_or_else(|| DEMO_KEY.into()),
            api_base: lookup("GEMINI_API_BASE")
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            model: lookup("GEMINI_MODEL").unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            port: lookup("PORT").and_then(|v| v.parse().ok()).unwrap_or(8080),
        }
    }

    pub fn is_demo(&self) -> bool {
        self.api_key.is_empty() || self.api_key == DEMO_KEY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_to_demo_mode() {
        let config = Config::from_lookup(|_| None);
        assert!(config.is_demo());
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn reads_overrides() {
        let vars: HashMap<&str, &str> =
            [("GEMINI_API_KEY", "abc"), ("PORT", "9000"), ("GEMINI_MODEL", "gemini-2.0-flash")].into();
        let config = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert!(!config.is_demo());
        assert_eq!(config.port, 9000);
        assert_eq!(config.model, "gemini-2.0-flash");
    }

    #[test]
    fn bad_port_falls_back() {
        let config = Config::from_lookup(|k| (k == "PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.port, 8080);
    }
}
