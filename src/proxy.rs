//! Proxy selector and proxy text validation.
//!
//! The proxy arrives as two pieces: a scheme selector (`none`, `http`,
//! `https`, `socks4`, `socks5`) and a compact text of the form
//! `[login:password@]host:port`. [`validate`] turns them into an optional
//! [`ProxyConfig`]; collaborators receive the proxy rendered as a URL via
//! [`ProxyConfig::to_url`] and never see the raw text.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ProxyFormatError;

/// `[login:password@]host:port`, anchored. Groups: login, password, host, port.
static PROXY_RE: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: This is a static literal regex pattern; compilation cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(r"^(?:([^:]+):([^@]+)@)?([^:]+):(\d+)$").expect("proxy regex")
});

/// Transport scheme of a configured proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyScheme {
    Http,
    Https,
    Socks4,
    Socks5,
}

impl ProxyScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Socks4 => "socks4",
            Self::Socks5 => "socks5",
        }
    }
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operator's proxy choice: no proxy, or a concrete scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxySelector {
    #[default]
    None,
    Scheme(ProxyScheme),
}

impl FromStr for ProxySelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "http" => Ok(Self::Scheme(ProxyScheme::Http)),
            "https" => Ok(Self::Scheme(ProxyScheme::Https)),
            "socks4" => Ok(Self::Scheme(ProxyScheme::Socks4)),
            "socks5" => Ok(Self::Scheme(ProxyScheme::Socks5)),
            other => Err(format!(
                "unknown proxy type '{other}' (expected none, http, https, socks4 or socks5)"
            )),
        }
    }
}

/// A validated proxy.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
    pub login: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ProxyConfig {
    /// Render as `scheme://[login[:password]@]host:port` with percent-encoded
    /// credentials. This is the only shape handed to collaborators.
    pub fn to_url(&self) -> String {
        let mut userinfo = String::new();
        if let Some(login) = &self.login {
            userinfo.push_str(&urlencoding::encode(login));
        }
        if let Some(password) = &self.password {
            userinfo.push(':');
            userinfo.push_str(&urlencoding::encode(password));
        }
        if !userinfo.is_empty() {
            userinfo.push('@');
        }
        format!("{}://{userinfo}{}:{}", self.scheme, self.host, self.port)
    }

    /// `scheme://host:port`, safe to log.
    pub fn redacted(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Validate a proxy selector plus proxy text.
///
/// With [`ProxySelector::None`] the text is not looked at and `Ok(None)` is
/// returned. Otherwise the text must be non-empty, match the anchored grammar,
/// and carry a port in `1..=65535`. Partial credentials (`login@host:port`)
/// are rejected.
pub fn validate(
    selector: ProxySelector,
    text: Option<&str>,
) -> Result<Option<ProxyConfig>, ProxyFormatError> {
    let ProxySelector::Scheme(scheme) = selector else {
        return Ok(None);
    };

    let text = text.unwrap_or_default();
    if text.is_empty() {
        return Err(ProxyFormatError {
            reason: "proxy text is empty",
        });
    }

    let caps = PROXY_RE.captures(text).ok_or(ProxyFormatError {
        reason: "text does not match the expected format",
    })?;

    // Without the full `login:password@` prefix an `@` ends up in the host.
    if caps[3].contains('@') {
        return Err(ProxyFormatError {
            reason: "credentials need both login and password",
        });
    }

    // `\d` is Unicode-aware; only ASCII digits are accepted as a port.
    if !caps[4].is_ascii() {
        return Err(ProxyFormatError {
            reason: "port must use ASCII digits",
        });
    }

    // Overflow and zero land here.
    let port = caps[4]
        .parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
        .ok_or(ProxyFormatError {
            reason: "port must be between 1 and 65535",
        })?;

    Ok(Some(ProxyConfig {
        scheme,
        host: caps[3].to_string(),
        port,
        login: caps.get(1).map(|m| m.as_str().to_string()),
        password: caps.get(2).map(|m| m.as_str().to_string()),
    }))
}
