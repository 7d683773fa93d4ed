//! Provider-specific SQL type names and identifier quoting.

use std::fmt;
use std::str::FromStr;

/// Target database engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Provider {
    /// PostgreSQL.
    #[default]
    Postgres,
    /// Firebird.
    Firebird,
}

/// Normalized roadmap type name -> (PostgreSQL, Firebird).
const TYPE_MAP: &[(&str, &str, &str)] = &[
    ("bigint", "bigint", "bigint"),
    ("bigserial", "bigserial", "bigint"),
    ("binary", "bytea", "blob sub_type binary"),
    ("blob", "bytea", "blob sub_type binary"),
    ("bool", "boolean", "boolean"),
    ("boolean", "boolean", "boolean"),
    ("bytea", "bytea", "blob sub_type binary"),
    ("char", "char", "char"),
    ("date", "date", "date"),
    ("datetime", "timestamp", "timestamp"),
    ("decimal", "numeric", "decimal"),
    ("double", "double precision", "double precision"),
    ("float", "real", "float"),
    ("guid", "uuid", "char(16) character set octets"),
    ("int", "integer", "integer"),
    ("int2", "smallint", "smallint"),
    ("int4", "integer", "integer"),
    ("int8", "bigint", "bigint"),
    ("integer", "integer", "integer"),
    ("json", "json", "blob sub_type text"),
    ("jsonb", "jsonb", "blob sub_type text"),
    ("long", "bigint", "bigint"),
    ("money", "money", "decimal(18, 2)"),
    ("numeric", "numeric", "numeric"),
    ("real", "real", "float"),
    ("serial", "serial", "integer"),
    ("short", "smallint", "smallint"),
    ("smallint", "smallint", "smallint"),
    ("string", "text", "varchar(8191)"),
    ("text", "text", "blob sub_type text"),
    ("time", "time", "time"),
    ("timestamp", "timestamp", "timestamp"),
    ("timestamptz", "timestamptz", "timestamp with time zone"),
    ("uuid", "uuid", "char(16) character set octets"),
    ("varchar", "varchar", "varchar"),
];

impl Provider {
    /// Map a roadmap type name to this provider's SQL type.
    ///
    /// Lookup is case-insensitive on the base name; a length/precision suffix
    /// such as `(255)` is carried over. Unknown names (enums, domains) pass
    /// through unchanged.
    pub fn map_type(&self, type_name: &str) -> String {
        let trimmed = type_name.trim();
        let (base, args) = match trimmed.find('(') {
            Some(idx) => (trimmed[..idx].trim(), &trimmed[idx..]),
            None => (trimmed, ""),
        };
        let normalized = base.to_ascii_lowercase();

        match TYPE_MAP.iter().find(|(name, _, _)| *name == normalized) {
            Some((_, postgres, firebird)) => {
                let mapped = match self {
                    Provider::Postgres => *postgres,
                    Provider::Firebird => *firebird,
                };
                // Mapped names that already carry arguments keep their own.
                if mapped.contains('(') || args.is_empty() {
                    mapped.to_string()
                } else {
                    format!("{}{}", mapped, args)
                }
            }
            None => trimmed.to_string(),
        }
    }

    /// Quote an identifier, preserving case.
    pub fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Postgres => write!(f, "postgres"),
            Provider::Firebird => write!(f, "firebird"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Provider::Postgres),
            "firebird" | "fb" => Ok(Provider::Firebird),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}
