//! Connection strings of the form
//! `spanner:///projects/<P>/instances/<I>/databases/<D>[?name=value&...]`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DriverError;

pub const SCHEME: &str = "spanner";

static PATH_REGEX: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"^/?projects/([^/]+)/instances/([^/]+)/databases/([^/]+)/?$")
});

fn path_regex() -> Result<&'static Regex, DriverError> {
    PATH_REGEX
        .as_ref()
        .map_err(|err| DriverError::ConfigError(format!("invalid path pattern: {err}")))
}

/// Fully qualified database name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dsn {
    pub project: String,
    pub instance: String,
    pub database: String,
}

impl Dsn {
    pub fn new(
        project: impl Into<String>,
        instance: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            instance: instance.into(),
            database: database.into(),
        }
    }

    /// `projects/P/instances/I`
    #[must_use]
    pub fn instance_path(&self) -> String {
        format!("projects/{}/instances/{}", self.project, self.instance)
    }
}

impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/databases/{}", self.instance_path(), self.database)
    }
}

impl FromStr for Dsn {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_connection_uri(s).map(|(dsn, _)| dsn)
    }
}

/// Parse a connection string into its database name and query parameters.
///
/// The scheme must be empty or `spanner`. Repeated query parameters keep their last value.
///
/// # Errors
/// Returns [`DriverError::ConfigError`] for malformed URIs, foreign schemes and paths that
/// are not exactly `projects/P/instances/I/databases/D`.
pub fn parse_connection_uri(uri: &str) -> Result<(Dsn, HashMap<String, String>), DriverError> {
    if let Some(pos) = find_invalid_percent(uri.as_bytes()) {
        return Err(DriverError::ConfigError(format!(
            "'{uri}' is not a valid uri: invalid escape at offset {pos}"
        )));
    }
    let without_fragment = uri.split_once('#').map_or(uri, |(head, _)| head);
    let (scheme, rest) = split_scheme(without_fragment).map_err(|msg| {
        DriverError::ConfigError(format!("'{uri}' is not a valid uri: {msg}"))
    })?;
    if !scheme.is_empty() && !scheme.eq_ignore_ascii_case(SCHEME) {
        return Err(DriverError::ConfigError(format!(
            "invalid uri scheme '{scheme}'"
        )));
    }

    let (hier, query) = rest.split_once('?').unwrap_or((rest, ""));
    let raw_path = match hier.strip_prefix("//") {
        Some(authority_and_path) => authority_and_path
            .find('/')
            .map_or("", |idx| &authority_and_path[idx..]),
        None => hier,
    };
    let path = decode(raw_path)?;

    let captures = path_regex()?.captures(&path).ok_or_else(|| {
        DriverError::ConfigError(format!(
            "invalid uri '{path}'; expected projects/P/instances/I/databases/D"
        ))
    })?;
    let dsn = Dsn::new(&captures[1], &captures[2], &captures[3]);

    let mut params = HashMap::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.insert(decode_query(key)?, decode_query(value)?);
    }
    Ok((dsn, params))
}

fn split_scheme(uri: &str) -> Result<(&str, &str), &'static str> {
    for (idx, ch) in uri.char_indices() {
        match ch {
            'a'..='z' | 'A'..='Z' => {}
            '0'..='9' | '+' | '-' | '.' if idx > 0 => {}
            ':' if idx == 0 => return Err("missing protocol scheme"),
            ':' => return Ok((&uri[..idx], &uri[idx + 1..])),
            _ => return Ok(("", uri)),
        }
    }
    Ok(("", uri))
}

fn decode(raw: &str) -> Result<String, DriverError> {
    urlencoding::decode(raw)
        .map(std::borrow::Cow::into_owned)
        .map_err(|err| DriverError::ConfigError(format!("invalid escape in '{raw}': {err}")))
}

fn decode_query(raw: &str) -> Result<String, DriverError> {
    decode(&raw.replace('+', " "))
}

fn find_invalid_percent(data: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i < data.len() {
        if data[i] == b'%' {
            if i + 2 >= data.len()
                || !data[i + 1].is_ascii_hexdigit()
                || !data[i + 2].is_ascii_hexdigit()
            {
                return Some(i);
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    None
}
