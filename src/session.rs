//! Session storage: the bearer token the gateway attaches to every request.
//!
//! The token lives in a browser-style cookie string (`name=value; other=value`)
//! persisted to a file. It is read once when the HTTP client is built; there is
//! no refresh. A missing file or missing cookie means an anonymous session.

use std::path::Path;

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Cannot read cookie file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ═══════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════

/// Snapshot of the session at client-construction time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    /// Anonymous session (no Authorization header).
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    /// Session with an explicit bearer token. Blank tokens are ignored.
    pub fn with_token(token: &str) -> Self {
        let token = token.trim();
        Self {
            token: (!token.is_empty()).then(|| token.to_string()),
        }
    }

    /// Extract `cookie_name` from a cookie header string.
    pub fn from_cookie_header(header: &str, cookie_name: &str) -> Self {
        header
            .split(';')
            .filter_map(|pair| pair.split_once('='))
            .find(|(name, _)| name.trim() == cookie_name)
            .map(|(_, value)| Self::with_token(value.trim().trim_matches('"')))
            .unwrap_or_default()
    }

    /// Read the cookie file. A file that does not exist yields an anonymous session.
    pub fn from_cookie_file(path: &Path, cookie_name: &str) -> Result<Self, SessionError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let session = Self::from_cookie_header(contents.trim(), cookie_name);
                if session.token.is_none() {
                    tracing::debug!(cookie = cookie_name, "Token cookie not present, anonymous session");
                }
                Ok(session)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No cookie file, anonymous session");
                Ok(Self::anonymous())
            }
            Err(source) => Err(SessionError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Value for the `Authorization` header, if authenticated.
    pub fn authorization(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Bearer {t}"))
    }
}
