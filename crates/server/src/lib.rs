pub mod error;
pub mod response;
pub mod routes;

use prep::{Collaborators, Pipeline, PipelineSettings, PrepConfig};
use strip_ansi_escapes::strip;

/// Shared by every request; each request builds its own [`Pipeline`] from it
#[derive(Clone)]
pub struct AppState {
    collaborators: Collaborators,
    settings: PipelineSettings,
}

impl AppState {
    pub fn new(collaborators: Collaborators, settings: PipelineSettings) -> Self {
        Self {
            collaborators,
            settings,
        }
    }

    pub fn from_config(config: &PrepConfig) -> Self {
        Self::new(
            Collaborators::from_config(config),
            PipelineSettings::from_config(config),
        )
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.collaborators.clone(), self.settings.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_allowed_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("HOST").filter(|h| !h.trim().is_empty()) {
            config.host = host.trim().to_string();
        }

        if let Some(raw) = lookup("BACKEND_PORT").or_else(|| lookup("PORT")) {
            // remove any ANSI codes before parsing
            let cleaned = String::from_utf8(strip(raw.as_bytes())).unwrap_or_default();
            match cleaned.trim().parse::<u16>() {
                Ok(port) => config.port = port,
                Err(_) => tracing::warn!("Invalid port '{}', using {}", raw, config.port),
            }
        }

        if let Some(origins) = lookup("CORS_ALLOWED_ORIGINS") {
            let origins: Vec<String> = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
            if !origins.is_empty() {
                config.cors_allowed_origins = origins;
            }
        }

        config
    }
}
