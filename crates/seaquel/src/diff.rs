//! Seam to the external schema-diff tool.
//!
//! The diff algorithm itself lives outside this crate. A [`SchemaDiffer`]
//! describes the live database and compares it with the declared schema;
//! the statements it returns are handed back to the caller and never
//! executed here.

use std::fmt;
use std::str::FromStr;

use seaquel_core::SchemaDescription;

use crate::client::BoxFuture;
use crate::config::ConnectOptions;

/// Error type of diff collaborators.
pub type DiffError = Box<dyn std::error::Error + Send + Sync>;

/// How destructive the generated migration may be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MigrationMode {
    /// Only additive changes.
    #[default]
    Safe,
    /// Destructive changes emitted as comments.
    Warn,
    /// Destructive changes emitted as statements.
    Drop,
}

impl MigrationMode {
    /// Returns the mode name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Warn => "warn",
            Self::Drop => "drop",
        }
    }
}

impl fmt::Display for MigrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "safe" => Ok(Self::Safe),
            "warn" => Ok(Self::Warn),
            "drop" => Ok(Self::Drop),
            other => Err(format!("unknown migration mode: {other}")),
        }
    }
}

/// External schema-diff collaborator.
pub trait SchemaDiffer: Send + Sync {
    /// Describes the schema of the live database reachable with `options`.
    fn describe_live_schema<'a>(
        &'a self,
        options: &'a ConnectOptions,
    ) -> BoxFuture<'a, Result<SchemaDescription, DiffError>>;

    /// Returns the DDL turning `live` into `desired`.
    fn compute_migration(
        &self,
        live: &SchemaDescription,
        desired: &SchemaDescription,
        mode: MigrationMode,
    ) -> Result<Vec<String>, DiffError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_mode_parse() {
        assert_eq!("safe".parse::<MigrationMode>(), Ok(MigrationMode::Safe));
        assert_eq!("DROP".parse::<MigrationMode>(), Ok(MigrationMode::Drop));
        assert!("nuke".parse::<MigrationMode>().is_err());
        assert_eq!(MigrationMode::default().to_string(), "safe");
    }
}
