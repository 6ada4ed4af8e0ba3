//! SQL dialect support.
//!
//! Identifier quoting and placeholder syntax differ between databases. The
//! statement builder only talks to the [`Dialect`] trait.

mod postgres;

pub use postgres::PostgresDialect;

/// Trait for SQL dialect-specific behavior.
pub trait Dialect: Send + Sync {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character.
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Returns the placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String;

    /// Quotes an identifier, doubling any embedded quote character.
    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        let escaped = name.replace(quote, &format!("{quote}{quote}"));
        format!("{quote}{escaped}{quote}")
    }

    /// Quotes a possibly schema-qualified name: `schema.table`.
    fn quote_qualified(&self, schema: &str, name: &str) -> String {
        format!(
            "{}.{}",
            self.quote_identifier(schema),
            self.quote_identifier(name)
        )
    }
}
