//! `key=value;` connection string handling.
//!
//! ADO.NET, OLE DB, and ODBC share the same outer syntax: `;`-separated
//! pairs with case-insensitive keys. Values may be wrapped in `{}` (ODBC) or
//! in single or double quotes (ADO.NET, OLE DB). OLE DB and ODBC strings
//! that target SQL Server are rewritten into the ADO.NET form the TDS client
//! understands.

use crate::error::{DbTestError, Result};
use std::time::Duration;

/// Connect timeout used when the connection string does not set one.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;

const SERVER_KEYS: &[&str] = &["server", "data source", "address", "addr", "network address"];
const DATABASE_KEYS: &[&str] = &["database", "initial catalog"];
const USER_KEYS: &[&str] = &["user id", "uid", "user"];
const PASSWORD_KEYS: &[&str] = &["password", "pwd"];
const INTEGRATED_KEYS: &[&str] = &["integrated security", "trusted_connection"];
const TIMEOUT_KEYS: &[&str] = &["connect timeout", "connection timeout", "timeout", "logintimeout"];
const PASS_THROUGH_KEYS: &[&str] = &[
    "encrypt",
    "trustservercertificate",
    "trust server certificate",
    "application name",
    "applicationintent",
    "application intent",
];

/// OLE DB providers that speak TDS to SQL Server.
const SQL_SERVER_OLEDB_PROVIDERS: &[&str] = &["sqloledb", "sqlncli", "msoledbsql"];

/// A parsed connection string, keeping the original order of keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    pairs: Vec<(String, String)>,
}

impl ConnectionString {
    /// Parses a connection string.
    pub fn parse(input: &str) -> Result<Self> {
        let chars: Vec<char> = input.chars().collect();
        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut pos = 0;

        while pos < chars.len() {
            // Skip separators and whitespace between pairs
            while pos < chars.len() && (chars[pos] == ';' || chars[pos].is_whitespace()) {
                pos += 1;
            }
            if pos >= chars.len() {
                break;
            }

            let key_start = pos;
            while pos < chars.len() && chars[pos] != '=' {
                if chars[pos] == ';' {
                    return Err(malformed(key_start));
                }
                pos += 1;
            }
            if pos >= chars.len() {
                return Err(malformed(key_start));
            }
            let key: String = chars[key_start..pos].iter().collect();
            let key = key.trim().to_lowercase();
            if key.is_empty() {
                return Err(malformed(key_start));
            }
            pos += 1; // '='

            while pos < chars.len() && chars[pos].is_whitespace() && chars[pos] != ';' {
                pos += 1;
            }

            let value = match chars.get(pos) {
                Some(&'{') => {
                    let (value, next) = read_delimited(&chars, pos, '}').ok_or(malformed(pos))?;
                    pos = expect_pair_end(&chars, next)?;
                    value
                }
                Some(&(quote @ ('"' | '\''))) => {
                    let (value, next) = read_delimited(&chars, pos, quote).ok_or(malformed(pos))?;
                    pos = expect_pair_end(&chars, next)?;
                    value
                }
                _ => {
                    let value_start = pos;
                    while pos < chars.len() && chars[pos] != ';' {
                        pos += 1;
                    }
                    let value: String = chars[value_start..pos].iter().collect();
                    value.trim().to_string()
                }
            };

            // Later duplicates win, as in every provider
            pairs.retain(|(k, _)| *k != key);
            pairs.push((key, value));
        }

        Ok(Self { pairs })
    }

    /// Returns the value for a key, ignoring case.
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the value of the first present key among `keys`.
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get(key))
    }

    /// Sets a key, replacing any existing value.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = key.to_lowercase();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    /// Returns the connect timeout, or `None` when it is disabled with `0`.
    pub fn connect_timeout(&self) -> Result<Option<Duration>> {
        let Some(raw) = self.get_any(TIMEOUT_KEYS) else {
            return Ok(Some(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)));
        };
        let secs: u64 = raw.parse().map_err(|_| {
            DbTestError::connection(format!("Invalid value for connect timeout: '{raw}'"))
        })?;
        Ok((secs > 0).then(|| Duration::from_secs(secs)))
    }

    /// Renders the pairs back into a `key=value;` string, quoting as needed.
    pub fn to_ado_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{k}={}", quote_value(v)))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Builds an ADO.NET string from the SQL Server keys of any dialect.
    fn to_sql_server_ado(&self) -> Result<String> {
        let server = self
            .get_any(SERVER_KEYS)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DbTestError::connection("The connection string does not name a server."))?;

        let mut ado = ConnectionString::default();
        ado.set("server", server);
        if let Some(database) = self.get_any(DATABASE_KEYS) {
            ado.set("database", database);
        }
        if let Some(user) = self.get_any(USER_KEYS) {
            ado.set("user id", user);
        }
        if let Some(password) = self.get_any(PASSWORD_KEYS) {
            ado.set("password", password);
        }
        if let Some(integrated) = self.get_any(INTEGRATED_KEYS) {
            let enabled = matches!(
                integrated.to_lowercase().as_str(),
                "sspi" | "true" | "yes"
            );
            ado.set("integrated security", if enabled { "true" } else { "false" });
        }
        if let Some(raw) = self.get_any(TIMEOUT_KEYS) {
            ado.set("connect timeout", raw);
        }
        for key in PASS_THROUGH_KEYS {
            if let Some(value) = self.get(key) {
                ado.set(key, value);
            }
        }
        Ok(ado.to_ado_string())
    }
}

/// Rewrites an OLE DB connection string for a SQL Server provider.
pub fn oledb_to_ado(input: &str) -> Result<String> {
    let parsed = ConnectionString::parse(input)?;
    let provider = parsed
        .get("provider")
        .ok_or_else(|| DbTestError::connection("An OLE DB Provider was not specified in the connection string."))?;

    let normalized = provider.to_lowercase();
    if !SQL_SERVER_OLEDB_PROVIDERS
        .iter()
        .any(|p| normalized.starts_with(p))
    {
        return Err(DbTestError::connection(format!(
            "The '{provider}' provider is not supported. Only SQL Server providers (SQLOLEDB, SQLNCLI, MSOLEDBSQL) can be reached."
        )));
    }
    parsed.to_sql_server_ado()
}

/// Rewrites an ODBC connection string for a SQL Server driver.
pub fn odbc_to_ado(input: &str) -> Result<String> {
    let parsed = ConnectionString::parse(input)?;
    let Some(driver) = parsed.get("driver") else {
        let target = parsed.get("dsn").unwrap_or_default();
        return Err(DbTestError::connection(format!(
            "Data source name '{target}' cannot be resolved without an ODBC driver manager. Specify Driver=... or build with the odbc feature."
        )));
    };

    if !driver.to_lowercase().contains("sql server") {
        return Err(DbTestError::connection(format!(
            "The ODBC driver '{driver}' is not supported. Only SQL Server drivers can be reached."
        )));
    }
    parsed.to_sql_server_ado()
}

/// Reads a value wrapped in `open`...`close`, where a doubled closing
/// character stands for itself. Returns the value and the index after it.
fn read_delimited(chars: &[char], start: usize, close: char) -> Option<(String, usize)> {
    let mut value = String::new();
    let mut pos = start + 1;
    while pos < chars.len() {
        if chars[pos] == close {
            if chars.get(pos + 1) == Some(&close) {
                value.push(close);
                pos += 2;
                continue;
            }
            return Some((value, pos + 1));
        }
        value.push(chars[pos]);
        pos += 1;
    }
    None
}

fn expect_pair_end(chars: &[char], mut pos: usize) -> Result<usize> {
    while pos < chars.len() && chars[pos].is_whitespace() {
        pos += 1;
    }
    match chars.get(pos) {
        None | Some(';') => Ok(pos),
        Some(_) => Err(malformed(pos)),
    }
}

fn quote_value(value: &str) -> String {
    let needs_quotes = value.contains(';')
        || value.contains('"')
        || value.contains('\'')
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace);
    if needs_quotes {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn malformed(index: usize) -> DbTestError {
    DbTestError::connection(format!(
        "Format of the initialization string does not conform to specification starting at index {index}."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_pairs() {
        let cs = ConnectionString::parse("Server=SQLProd01;Database=NorthWind;Integrated Security=SSPI")
            .unwrap();
        assert_eq!(cs.get("server"), Some("SQLProd01"));
        assert_eq!(cs.get("DATABASE"), Some("NorthWind"));
        assert_eq!(cs.get("integrated security"), Some("SSPI"));
        assert_eq!(cs.get("user id"), None);
    }

    #[test]
    fn test_parse_quoted_and_braced_values() {
        let cs = ConnectionString::parse(
            r#"Driver={ODBC Driver 17 for SQL Server};PWD={a;b}}c};Application Name="say ""hi"""; User='o''brien'"#,
        )
        .unwrap();
        assert_eq!(cs.get("driver"), Some("ODBC Driver 17 for SQL Server"));
        assert_eq!(cs.get("pwd"), Some("a;b}c"));
        assert_eq!(cs.get("application name"), Some("say \"hi\""));
        assert_eq!(cs.get("user"), Some("o'brien"));
    }

    #[test]
    fn test_parse_trims_and_tolerates_trailing_separator() {
        let cs = ConnectionString::parse("  server = host , 1433 ; ;database=db;").unwrap();
        assert_eq!(cs.get("server"), Some("host , 1433"));
        assert_eq!(cs.get("database"), Some("db"));
    }

    #[test]
    fn test_later_duplicate_wins() {
        let cs = ConnectionString::parse("Database=a;DATABASE=b").unwrap();
        assert_eq!(cs.get("database"), Some("b"));
    }

    #[test]
    fn test_parse_rejects_missing_equals() {
        let err = ConnectionString::parse("server=x;garbage").unwrap_err();
        assert!(matches!(err, DbTestError::Connection { .. }));
        assert!(err.to_string().contains("index 9"));
    }

    #[test]
    fn test_parse_rejects_unterminated_brace() {
        assert!(ConnectionString::parse("Driver={SQL Server").is_err());
        assert!(ConnectionString::parse("Password=\"abc\"x").is_err());
    }

    #[test]
    fn test_connect_timeout() {
        let cs = ConnectionString::parse("Server=x").unwrap();
        assert_eq!(cs.connect_timeout().unwrap(), Some(Duration::from_secs(15)));

        let cs = ConnectionString::parse("Server=x;Connect Timeout=3").unwrap();
        assert_eq!(cs.connect_timeout().unwrap(), Some(Duration::from_secs(3)));

        let cs = ConnectionString::parse("Server=x;Connection Timeout=0").unwrap();
        assert_eq!(cs.connect_timeout().unwrap(), None);

        let cs = ConnectionString::parse("Server=x;Timeout=soon").unwrap();
        assert!(cs.connect_timeout().is_err());
    }

    #[test]
    fn test_to_ado_string_quotes_when_needed() {
        let mut cs = ConnectionString::default();
        cs.set("server", "host");
        cs.set("password", "p;w\"d");
        assert_eq!(cs.to_ado_string(), r#"server=host;password="p;w""d""#);

        let reparsed = ConnectionString::parse(&cs.to_ado_string()).unwrap();
        assert_eq!(reparsed.get("password"), Some("p;w\"d"));
    }

    #[test]
    fn test_oledb_translation() {
        let ado = oledb_to_ado(
            "Provider=SQLNCLI11;Data Source=SQLProd01;Initial Catalog=NorthWind;Integrated Security=SSPI;OLE DB Services=-4",
        )
        .unwrap();
        assert_eq!(
            ado,
            "server=SQLProd01;database=NorthWind;integrated security=true"
        );
    }

    #[test]
    fn test_oledb_rejects_other_providers() {
        let err = oledb_to_ado("Provider=Microsoft.Jet.OLEDB.4.0;Data Source=c:\\db.mdb").unwrap_err();
        assert!(err.to_string().contains("Microsoft.Jet.OLEDB.4.0"));

        assert!(oledb_to_ado("Data Source=SQLProd01").is_err());
    }

    #[test]
    fn test_odbc_translation() {
        let ado = odbc_to_ado(
            "Driver={ODBC Driver 18 for SQL Server};Server=tcp:db,1433;Database=Accounting;UID=app;PWD=secret;Encrypt=no",
        )
        .unwrap();
        assert_eq!(
            ado,
            "server=tcp:db,1433;database=Accounting;user id=app;password=secret;encrypt=no"
        );
    }

    #[test]
    fn test_odbc_rejects_dsn_and_other_drivers() {
        let err = odbc_to_ado("DSN=Accounting;trusted_connection=yes").unwrap_err();
        assert!(err.to_string().contains("Accounting"));

        let err = odbc_to_ado("Driver={PostgreSQL Unicode};Server=pg").unwrap_err();
        assert!(err.to_string().contains("PostgreSQL Unicode"));
    }

    #[test]
    fn test_translation_requires_server() {
        let err = odbc_to_ado("Driver={SQL Server};Database=x").unwrap_err();
        assert!(err.to_string().contains("does not name a server"));
    }
}
