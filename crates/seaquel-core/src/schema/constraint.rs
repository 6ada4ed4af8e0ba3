//! Constraints, indexes and the foreign-key lookup used by joins.

use std::collections::BTreeMap;

/// The kind of a table constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintKind {
    /// PRIMARY KEY.
    Primary,
    /// UNIQUE.
    Unique,
    /// FOREIGN KEY referencing another table.
    Foreign {
        /// Referenced table name.
        referenced_table: String,
        /// Referenced columns, positionally matching the local columns.
        referenced_columns: Vec<String>,
    },
}

impl ConstraintKind {
    /// Returns the kind tag used in schema descriptions.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Unique => "unique",
            Self::Foreign { .. } => "foreign",
        }
    }
}

/// A named table constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    /// Constraint name.
    pub name: String,
    /// Constraint kind.
    pub kind: ConstraintKind,
    /// Local columns.
    pub columns: Vec<String>,
}

impl Constraint {
    /// Referenced table and columns for foreign keys.
    #[must_use]
    pub fn reference(&self) -> Option<(&str, &[String])> {
        match &self.kind {
            ConstraintKind::Foreign {
                referenced_table,
                referenced_columns,
            } => Some((referenced_table, referenced_columns)),
            _ => None,
        }
    }
}

/// Index access method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexMethod {
    /// GiST (the default).
    #[default]
    Gist,
    /// B-tree.
    Btree,
}

impl IndexMethod {
    /// Returns the SQL name of the method.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Gist => "GIST",
            Self::Btree => "BTREE",
        }
    }
}

/// A table index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    /// Index name.
    pub name: String,
    /// Access method.
    pub method: IndexMethod,
    /// Indexed columns.
    pub columns: Vec<String>,
}

/// Outcome of a foreign-key lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForeignKeyMatch<'a> {
    /// Exactly one constraint matched.
    Unique(&'a Constraint),
    /// Several constraints matched; carries their names.
    Ambiguous(Vec<String>),
    /// Nothing matched.
    Missing,
}

/// Foreign keys of one table keyed by (referenced table, sorted local
/// columns). Values are positions in the table's constraint list.
#[derive(Debug, Clone, Default)]
pub(crate) struct ForeignKeyIndex {
    by_table: BTreeMap<String, BTreeMap<Vec<String>, Vec<usize>>>,
}

impl ForeignKeyIndex {
    pub(crate) fn register(&mut self, position: usize, constraint: &Constraint) {
        if let Some((referenced, _)) = constraint.reference() {
            self.by_table
                .entry(String::from(referenced))
                .or_default()
                .entry(sorted(&constraint.columns))
                .or_default()
                .push(position);
        }
    }

    /// Finds the constraint linking to `referenced`, optionally restricted
    /// to the given local columns (order-insensitive).
    pub(crate) fn lookup<'a>(
        &self,
        constraints: &'a [Constraint],
        referenced: &str,
        through: Option<&[String]>,
    ) -> ForeignKeyMatch<'a> {
        let Some(by_columns) = self.by_table.get(referenced) else {
            return ForeignKeyMatch::Missing;
        };
        let positions: Vec<usize> = match through {
            Some(columns) => by_columns.get(&sorted(columns)).cloned().unwrap_or_default(),
            None => by_columns.values().flatten().copied().collect(),
        };
        match positions.as_slice() {
            [] => ForeignKeyMatch::Missing,
            [single] => constraints
                .get(*single)
                .map_or(ForeignKeyMatch::Missing, ForeignKeyMatch::Unique),
            many => ForeignKeyMatch::Ambiguous(
                many.iter()
                    .filter_map(|p| constraints.get(*p))
                    .map(|c| c.name.clone())
                    .collect(),
            ),
        }
    }
}

fn sorted(columns: &[String]) -> Vec<String> {
    let mut columns = columns.to_vec();
    columns.sort();
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fk(name: &str, columns: &[&str], table: &str) -> Constraint {
        Constraint {
            name: String::from(name),
            kind: ConstraintKind::Foreign {
                referenced_table: String::from(table),
                referenced_columns: vec![String::from("id")],
            },
            columns: columns.iter().map(|c| String::from(*c)).collect(),
        }
    }

    fn index_of(constraints: &[Constraint]) -> ForeignKeyIndex {
        let mut index = ForeignKeyIndex::default();
        for (position, constraint) in constraints.iter().enumerate() {
            index.register(position, constraint);
        }
        index
    }

    #[test]
    fn test_lookup_unique() {
        let constraints = vec![fk("n_user_fk", &["user_id"], "users")];
        let index = index_of(&constraints);
        assert_eq!(
            index.lookup(&constraints, "users", None),
            ForeignKeyMatch::Unique(&constraints[0])
        );
        assert_eq!(
            index.lookup(&constraints, "posts", None),
            ForeignKeyMatch::Missing
        );
    }

    #[test]
    fn test_lookup_ambiguous_without_through() {
        let constraints = vec![
            fk("m_sender_fk", &["sender_id"], "users"),
            fk("m_recipient_fk", &["recipient_id"], "users"),
        ];
        let index = index_of(&constraints);

        match index.lookup(&constraints, "users", None) {
            ForeignKeyMatch::Ambiguous(names) => assert_eq!(names.len(), 2),
            other => panic!("expected ambiguity, got {other:?}"),
        }

        let through = vec![String::from("recipient_id")];
        assert_eq!(
            index.lookup(&constraints, "users", Some(&through)),
            ForeignKeyMatch::Unique(&constraints[1])
        );
    }

    #[test]
    fn test_lookup_through_is_order_insensitive() {
        let constraints = vec![fk("c_fk", &["b", "a"], "pairs")];
        let index = index_of(&constraints);
        let through = vec![String::from("a"), String::from("b")];
        assert_eq!(
            index.lookup(&constraints, "pairs", Some(&through)),
            ForeignKeyMatch::Unique(&constraints[0])
        );
    }

    #[test]
    fn test_non_foreign_constraints_are_not_indexed() {
        let constraints = vec![Constraint {
            name: String::from("users_id_pk"),
            kind: ConstraintKind::Primary,
            columns: vec![String::from("id")],
        }];
        let index = index_of(&constraints);
        assert!(index.by_table.is_empty());
    }

    #[test]
    fn test_index_method_default_is_gist() {
        assert_eq!(IndexMethod::default(), IndexMethod::Gist);
        assert_eq!(IndexMethod::Btree.as_sql(), "BTREE");
    }
}
