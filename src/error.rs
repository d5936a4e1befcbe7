//! Error taxonomy shared by the resolver, layout engine and channel.

use thiserror::Error;

/// The configuration payload could not be turned into a document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A syntactically valid document that cannot be laid out.
///
/// The `Display` text is shown to the user as-is, so it names the field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("Missing `size` property in config.json")]
    MissingSize,
    #[error("Invalid `size` property in config.json (expected ROWSxCOLS, got \"{0}\")")]
    InvalidSize(String),
    #[error("Missing `buttons` property in config.json")]
    MissingButtons,
    #[error("Missing button `macro` property in config.json (button {})", .index + 1)]
    MissingMacro { index: usize },
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("could not connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },
    #[error("connection closed")]
    Closed,
    #[error("socket setup failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket error: {0}")]
    Socket(#[from] tungstenite::Error),
}
