//! Text frames exchanged with the macrodeck server.

use std::fmt;

/// Frames the server sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    AuthRequired,
    AuthNotRequired,
    AuthSuccess,
    AuthFailed,
    /// Raw JSON payload following `config:`
    Config(String),
    /// Server-side config loading failed (`conf-err-N`)
    ConfigLoadFailed(ConfigLoadError),
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLoadError {
    HomeDirectory,
    NotFound,
    Parse,
}

impl ConfigLoadError {
    pub fn message(&self) -> &'static str {
        match self {
            ConfigLoadError::HomeDirectory => "Server could not determine its home directory",
            ConfigLoadError::NotFound => "Server config not found (~/.config/macrodeck/config.json)",
            ConfigLoadError::Parse => "Server config.json could not be parsed",
        }
    }
}

impl Inbound {
    pub fn parse(frame: &str) -> Self {
        match frame {
            "auth-required" => Inbound::AuthRequired,
            "auth-not-required" => Inbound::AuthNotRequired,
            "auth-success" => Inbound::AuthSuccess,
            "auth-failed" => Inbound::AuthFailed,
            "conf-err-1" => Inbound::ConfigLoadFailed(ConfigLoadError::HomeDirectory),
            "conf-err-2" => Inbound::ConfigLoadFailed(ConfigLoadError::NotFound),
            "conf-err-3" => Inbound::ConfigLoadFailed(ConfigLoadError::Parse),
            other => match other.strip_prefix("config:") {
                Some(payload) => Inbound::Config(payload.to_string()),
                None => Inbound::Unknown(other.to_string()),
            },
        }
    }

    /// Short name for logging (config payloads can be large)
    pub fn kind(&self) -> &'static str {
        match self {
            Inbound::AuthRequired => "auth-required",
            Inbound::AuthNotRequired => "auth-not-required",
            Inbound::AuthSuccess => "auth-success",
            Inbound::AuthFailed => "auth-failed",
            Inbound::Config(_) => "config",
            Inbound::ConfigLoadFailed(_) => "conf-err",
            Inbound::Unknown(_) => "unknown",
        }
    }
}

/// Frames the client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    GetConfig,
    Auth(String),
    RunMacro(String),
}

impl fmt::Display for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outbound::GetConfig => f.write_str("get-config"),
            Outbound::Auth(password) => write!(f, "auth:{}", password),
            Outbound::RunMacro(name) => write!(f, "run-macro:{}", name),
        }
    }
}
