//! Native loader for Telethon-style session artifacts.
//!
//! Two encodings of the same logical session are understood:
//!
//! ## Binary-backed (`*.session` SQLite database)
//!
//! ```sql
//! CREATE TABLE sessions (
//!     dc_id INTEGER PRIMARY KEY,
//!     server_address TEXT,
//!     port INTEGER,
//!     auth_key BLOB,
//!     takeout_id INTEGER
//! );
//! ```
//!
//! The database is opened read-only; only the first row is used.
//!
//! ## String-backed (portable token)
//!
//! `'1' + urlsafe_base64(dc_id:u8 | ip:4|16 bytes | port:u16 BE | auth_key:256)`
//!
//! Padding is optional on input and always emitted on output. A decoded
//! payload of 263 bytes carries an IPv4 address, 275 bytes an IPv6 address.
//!
//! Loading is purely local: `ClientParams` are accepted for the collaborator
//! contract but no network connection is made here.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

use anyhow::{Context, bail};
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use tracing::{debug, trace};

use crate::backends::SessionLoader;
use crate::model::{AUTH_KEY_SIZE, AuthKey, AuthSession, ClientParams};

/// Leading version marker of a portable session token.
pub const STRING_SESSION_VERSION: char = '1';

const IPV4_PAYLOAD_LEN: usize = 1 + 4 + 2 + AUTH_KEY_SIZE;
const IPV6_PAYLOAD_LEN: usize = 1 + 16 + 2 + AUTH_KEY_SIZE;

/// URL-safe alphabet, padded on encode, padding-indifferent on decode.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Telethon session loader.
pub struct TelethonLoader;

impl SessionLoader for TelethonLoader {
    fn name(&self) -> &str {
        "telethon"
    }

    fn load_file(&self, path: &Path, client: &ClientParams) -> anyhow::Result<AuthSession> {
        trace!(path = %path.display(), api_id = client.api_id, "opening SQLite session");
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open {} as SQLite", path.display()))?;

        let row = conn
            .query_row(
                "SELECT dc_id, server_address, port, auth_key FROM sessions LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                        row.get::<_, Option<Vec<u8>>>(3)?,
                    ))
                },
            )
            .optional()
            .with_context(|| format!("{} is not a session database", path.display()))?;

        let Some((dc_id, server_address, port, auth_key)) = row else {
            bail!("{} holds no session row", path.display());
        };

        let dc_id = u8::try_from(dc_id).with_context(|| format!("invalid dc_id {dc_id}"))?;
        let server_address = server_address
            .context("session row has no server address")?
            .parse::<IpAddr>()
            .context("session row has an invalid server address")?;
        let port = port
            .and_then(|p| u16::try_from(p).ok())
            .context("session row has an invalid port")?;
        let auth_key = auth_key
            .as_deref()
            .and_then(AuthKey::from_slice)
            .context("session is not authorized (missing or malformed auth key)")?;

        debug!(
            path = %path.display(),
            dc_id,
            fingerprint = auth_key.fingerprint(),
            "loaded binary-backed session"
        );
        Ok(AuthSession {
            dc_id,
            server_address,
            port,
            auth_key,
        })
    }

    fn load_string(&self, token: &str, client: &ClientParams) -> anyhow::Result<AuthSession> {
        trace!(api_id = client.api_id, len = token.len(), "decoding string session");
        let session = decode_string_session(token)?;
        debug!(
            dc_id = session.dc_id,
            fingerprint = session.auth_key.fingerprint(),
            "loaded string-backed session"
        );
        Ok(session)
    }
}

/// Decode a portable session token.
///
/// Error messages never include the token itself.
pub fn decode_string_session(token: &str) -> anyhow::Result<AuthSession> {
    let Some(body) = token.strip_prefix(STRING_SESSION_VERSION) else {
        bail!("unsupported string session version");
    };
    let data = TOKEN_ENGINE
        .decode(body)
        .context("string session is not valid base64")?;

    let ip_len = match data.len() {
        IPV4_PAYLOAD_LEN => 4,
        IPV6_PAYLOAD_LEN => 16,
        n => bail!("string session payload has unexpected length {n}"),
    };

    let dc_id = data[0];
    let ip = &data[1..1 + ip_len];
    let server_address = if ip_len == 4 {
        IpAddr::V4(Ipv4Addr::from(<[u8; 4]>::try_from(ip)?))
    } else {
        IpAddr::V6(Ipv6Addr::from(<[u8; 16]>::try_from(ip)?))
    };
    let port = u16::from_be_bytes([data[1 + ip_len], data[2 + ip_len]]);
    let auth_key =
        AuthKey::from_slice(&data[3 + ip_len..]).context("string session auth key is malformed")?;

    Ok(AuthSession {
        dc_id,
        server_address,
        port,
        auth_key,
    })
}

/// Encode a session as a portable token.
pub fn encode_string_session(session: &AuthSession) -> String {
    let mut data = Vec::with_capacity(IPV6_PAYLOAD_LEN);
    data.push(session.dc_id);
    match session.server_address {
        IpAddr::V4(addr) => data.extend_from_slice(&addr.octets()),
        IpAddr::V6(addr) => data.extend_from_slice(&addr.octets()),
    }
    data.extend_from_slice(&session.port.to_be_bytes());
    data.extend_from_slice(session.auth_key.as_bytes());
    format!("{STRING_SESSION_VERSION}{}", TOKEN_ENGINE.encode(&data))
}
