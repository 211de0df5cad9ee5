//! Schema metadata model.
//!
//! Value objects describing tables, columns, constraints and indexes. These
//! drive both DDL synthesis and type-correct value generation. A [`Table`]
//! is treated as immutable once built; "altering" one means producing a new
//! value via [`Table::with_column`].

use crate::{
    error::Error,
    types::{is_numeric, is_string},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single column of a table.
///
/// `data_type` is a free-form SQL type string (`"integer"`,
/// `"VARCHAR(50)"`, `"NUMERIC(10,2)"`, `"INT[]"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// SQL type string.
    pub data_type: String,
    /// Whether NULL is accepted.
    pub is_nullable: bool,
    /// Whether the column is (part of) the primary key.
    pub is_primary_key: bool,
    /// Whether the column carries a single-column UNIQUE constraint.
    pub is_unique: bool,
    /// Whether a default value exists.
    pub has_default: bool,
    /// The default value expression, if any.
    pub default: Option<String>,
    /// An inline CHECK expression, if any.
    pub check: Option<String>,
    /// An inline foreign key target in `table.column` form, if any.
    pub foreign_key: Option<String>,
    /// Referential action on delete.
    pub on_delete: Option<FkAction>,
    /// Referential action on update.
    pub on_update: Option<FkAction>,
}

impl Column {
    /// Creates a nullable column with no constraints.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
            is_primary_key: false,
            is_unique: false,
            has_default: false,
            default: None,
            check: None,
            foreign_key: None,
            on_delete: None,
            on_update: None,
        }
    }

    /// Marks the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    /// Marks the column as primary key.
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    /// Marks the column UNIQUE.
    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    /// Attaches a default value expression.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self.has_default = true;
        self
    }

    /// Attaches an inline CHECK expression.
    pub fn with_check(mut self, check: impl Into<String>) -> Self {
        self.check = Some(check.into());
        self
    }

    /// Attaches an inline foreign key target (`table.column`).
    pub fn references(mut self, target: impl Into<String>) -> Self {
        self.foreign_key = Some(target.into());
        self
    }
}

/// Referential action of a foreign key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FkAction {
    /// NO ACTION.
    NoAction,
    /// RESTRICT.
    Restrict,
    /// CASCADE.
    Cascade,
    /// SET NULL.
    SetNull,
    /// SET DEFAULT.
    SetDefault,
}

impl FkAction {
    /// Parses a referential action keyword, defaulting to NO ACTION.
    pub fn parse_action(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "CASCADE" => FkAction::Cascade,
            "SET NULL" => FkAction::SetNull,
            "SET DEFAULT" => FkAction::SetDefault,
            "RESTRICT" => FkAction::Restrict,
            _ => FkAction::NoAction,
        }
    }
}

impl fmt::Display for FkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FkAction::NoAction => "NO ACTION",
            FkAction::Restrict => "RESTRICT",
            FkAction::Cascade => "CASCADE",
            FkAction::SetNull => "SET NULL",
            FkAction::SetDefault => "SET DEFAULT",
        })
    }
}

/// Kinds of table-level constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// PRIMARY KEY over the constraint's column list.
    PrimaryKey,
    /// UNIQUE over the constraint's column list.
    Unique {
        /// PG15 `NULLS NOT DISTINCT` modifier.
        nulls_not_distinct: bool,
    },
    /// CHECK with a free-form expression.
    Check {
        /// The check expression.
        expression: String,
    },
    /// FOREIGN KEY referencing another table.
    ForeignKey {
        /// Referenced table.
        references_table: String,
        /// Referenced columns.
        references_columns: Vec<String>,
        /// Referential action on delete.
        on_delete: Option<FkAction>,
        /// Referential action on update.
        on_update: Option<FkAction>,
        /// Whether the constraint is DEFERRABLE.
        deferrable: bool,
        /// Whether the constraint is INITIALLY DEFERRED.
        initially_deferred: bool,
    },
}

/// A table-level constraint over a list of columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConstraint {
    /// Optional constraint name.
    pub name: Option<String>,
    /// Columns the constraint covers. Empty for expression-only CHECKs.
    pub columns: Vec<String>,
    /// The constraint kind and its payload.
    pub kind: ConstraintKind,
}

impl TableConstraint {
    /// Creates a primary key constraint.
    pub fn primary_key(name: Option<&str>, columns: &[&str]) -> Self {
        Self {
            name: name.map(str::to_owned),
            columns: columns.iter().map(|c| (*c).to_owned()).collect(),
            kind: ConstraintKind::PrimaryKey,
        }
    }

    /// Creates a unique constraint.
    pub fn unique(name: &str, columns: &[&str]) -> Self {
        Self {
            name: Some(name.to_owned()),
            columns: columns.iter().map(|c| (*c).to_owned()).collect(),
            kind: ConstraintKind::Unique { nulls_not_distinct: false },
        }
    }

    /// Creates a check constraint.
    pub fn check(name: &str, expression: impl Into<String>) -> Self {
        Self {
            name: Some(name.to_owned()),
            columns: Vec::new(),
            kind: ConstraintKind::Check { expression: expression.into() },
        }
    }

    /// Creates a foreign key constraint with an ON DELETE action.
    pub fn foreign_key(
        name: &str,
        columns: &[&str],
        references_table: &str,
        references_columns: &[&str],
        on_delete: Option<FkAction>,
    ) -> Self {
        Self {
            name: Some(name.to_owned()),
            columns: columns.iter().map(|c| (*c).to_owned()).collect(),
            kind: ConstraintKind::ForeignKey {
                references_table: references_table.to_owned(),
                references_columns: references_columns.iter().map(|c| (*c).to_owned()).collect(),
                on_delete,
                on_update: None,
                deferrable: false,
                initially_deferred: false,
            },
        }
    }

    /// Marks a foreign key constraint DEFERRABLE.
    pub fn deferrable(mut self) -> Self {
        if let ConstraintKind::ForeignKey { deferrable, .. } = &mut self.kind {
            *deferrable = true;
        }
        self
    }
}

/// Index access method.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexMethod {
    /// B-tree (the default).
    Btree,
    /// Hash.
    Hash,
    /// GIN.
    Gin,
    /// GiST.
    Gist,
}

impl fmt::Display for IndexMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IndexMethod::Btree => "btree",
            IndexMethod::Hash => "hash",
            IndexMethod::Gin => "gin",
            IndexMethod::Gist => "gist",
        })
    }
}

/// An index definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,
    /// Indexed columns.
    pub columns: Vec<String>,
    /// Whether the index is UNIQUE.
    pub unique: bool,
    /// Access method.
    pub method: IndexMethod,
    /// WHERE clause for partial indexes.
    pub where_clause: Option<String>,
    /// INCLUDE columns for covering indexes.
    pub include_columns: Vec<String>,
}

impl Index {
    /// Creates a plain b-tree index.
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| (*c).to_owned()).collect(),
            unique: false,
            method: IndexMethod::Btree,
            where_clause: None,
            include_columns: Vec::new(),
        }
    }

    /// Marks the index UNIQUE.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Changes the access method.
    pub fn using(mut self, method: IndexMethod) -> Self {
        self.method = method;
        self
    }

    /// Attaches a WHERE clause, making the index partial.
    pub fn partial(mut self, where_clause: impl Into<String>) -> Self {
        self.where_clause = Some(where_clause.into());
        self
    }

    /// Attaches INCLUDE columns.
    pub fn include(mut self, columns: &[&str]) -> Self {
        self.include_columns = columns.iter().map(|c| (*c).to_owned()).collect();
        self
    }
}

/// A legacy plain column description, as used by callers that define tables
/// from loosely-typed records (e.g. deserialized JSON fixtures).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// SQL type string. `type` is accepted as an alias; missing means `text`.
    #[serde(alias = "type")]
    pub data_type: Option<String>,
    /// Primary key flag.
    #[serde(default)]
    pub is_primary_key: bool,
    /// Unique flag.
    #[serde(default)]
    pub is_unique: bool,
    /// Nullability, defaulting to nullable.
    #[serde(default = "default_true")]
    pub is_nullable: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ColumnSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            data_type: None,
            is_primary_key: false,
            is_unique: false,
            is_nullable: true,
        }
    }
}

impl ColumnSpec {
    /// Creates a spec from a name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: Some(data_type.into()),
            is_primary_key: false,
            is_unique: false,
            is_nullable: true,
        }
    }
}

/// A table definition with ordered columns.
///
/// Invariants, checked by [`Table::validate`]:
/// * every column mentioned by a constraint or index exists,
/// * `primary_key` names an existing column flagged `is_primary_key`,
/// * every name in `unique_columns` marks its column `is_unique`.
///
/// Foreign key targets are syntactic only; no cross-table validation
/// happens at build time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Columns in insertion order.
    pub columns: IndexMap<String, Column>,
    /// Single-column primary key, if any. Composite keys live in
    /// `constraints` only.
    pub primary_key: Option<String>,
    /// Columns carrying a single-column UNIQUE constraint.
    pub unique_columns: Vec<String>,
    /// Foreign keys as a `column -> "table.column"` mapping.
    pub foreign_keys: IndexMap<String, String>,
    /// Estimated row count (populated by introspection).
    pub row_count: u64,
    /// Table-level constraints.
    pub constraints: Vec<TableConstraint>,
    /// Indexes.
    pub indexes: Vec<Index>,
    /// Optional tablespace.
    pub tablespace: Option<String>,
    /// Optional comment.
    pub comment: Option<String>,
    /// Optional PARTITION BY clause body.
    pub partitioned_by: Option<String>,
    /// Optional INHERITS parent.
    pub inherits: Option<String>,
}

impl Table {
    /// Creates an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: IndexMap::new(),
            primary_key: None,
            unique_columns: Vec::new(),
            foreign_keys: IndexMap::new(),
            row_count: 0,
            constraints: Vec::new(),
            indexes: Vec::new(),
            tablespace: None,
            comment: None,
            partitioned_by: None,
            inherits: None,
        }
    }

    /// Builds a table from fully structured columns, deriving the
    /// single-column primary key, unique column list and foreign key map
    /// from the column flags.
    pub fn from_columns(name: impl Into<String>, columns: Vec<Column>) -> Self {
        let mut table = Table::new(name);
        for column in columns {
            if column.is_primary_key && table.primary_key.is_none() {
                table.primary_key = Some(column.name.clone());
            }
            if column.is_unique {
                table.unique_columns.push(column.name.clone());
            }
            if let Some(target) = &column.foreign_key {
                table.foreign_keys.insert(column.name.clone(), target.clone());
            }
            table.columns.insert(column.name.clone(), column);
        }
        table
    }

    /// Builds a table from legacy loosely-typed column records.
    ///
    /// `primary_key` and `unique_columns` arguments take precedence over the
    /// per-spec flags; a missing data type falls back to `text`.
    pub fn from_specs(
        name: impl Into<String>,
        specs: Vec<ColumnSpec>,
        primary_key: Option<String>,
        unique_columns: Vec<String>,
        foreign_keys: IndexMap<String, String>,
    ) -> Result<Self, Error> {
        let mut table = Table::new(name);
        for spec in specs {
            let is_pk = primary_key.as_deref() == Some(spec.name.as_str()) || spec.is_primary_key;
            let is_unique = unique_columns.contains(&spec.name) || spec.is_unique;
            let mut column =
                Column::new(spec.name.clone(), spec.data_type.unwrap_or_else(|| "text".to_owned()));
            column.is_nullable = spec.is_nullable;
            column.is_primary_key = is_pk;
            column.is_unique = is_unique;
            if is_pk && table.primary_key.is_none() {
                table.primary_key = Some(spec.name.clone());
            }
            if is_unique {
                table.unique_columns.push(spec.name.clone());
            }
            table.columns.insert(spec.name, column);
        }
        table.foreign_keys = foreign_keys;
        table.validate()?;
        Ok(table)
    }

    /// Returns a new table value with one more column appended.
    pub fn with_column(mut self, column: Column) -> Self {
        if column.is_unique {
            self.unique_columns.push(column.name.clone());
        }
        if let Some(target) = &column.foreign_key {
            self.foreign_keys.insert(column.name.clone(), target.clone());
        }
        self.columns.insert(column.name.clone(), column);
        self
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    /// Names of numeric columns.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .values()
            .filter(|c| is_numeric(&c.data_type))
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Names of string columns.
    pub fn string_columns(&self) -> Vec<&str> {
        self.columns
            .values()
            .filter(|c| is_string(&c.data_type))
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Columns as a list, in insertion order.
    pub fn columns_list(&self) -> Vec<&Column> {
        self.columns.values().collect()
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Verifies the structural invariants.
    pub fn validate(&self) -> Result<(), Error> {
        let missing = |column: &str| Error::ColumnNotFound {
            table: self.name.clone(),
            column: column.to_owned(),
        };

        for constraint in &self.constraints {
            for column in &constraint.columns {
                if !self.columns.contains_key(column) {
                    return Err(missing(column));
                }
            }
        }
        for index in &self.indexes {
            for column in index.columns.iter().chain(&index.include_columns) {
                if !self.columns.contains_key(column) {
                    return Err(missing(column));
                }
            }
        }
        if let Some(pk) = &self.primary_key {
            match self.columns.get(pk) {
                Some(column) if column.is_primary_key => {}
                _ => return Err(missing(pk)),
            }
        }
        for unique in &self.unique_columns {
            match self.columns.get(unique) {
                Some(column) if column.is_unique => {}
                _ => return Err(missing(unique)),
            }
        }
        for column in self.foreign_keys.keys() {
            if !self.columns.contains_key(column) {
                return Err(missing(column));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        Table::from_columns(
            "users",
            vec![
                Column::new("id", "integer").not_null().primary_key(),
                Column::new("email", "varchar(100)").not_null().unique(),
                Column::new("age", "integer"),
                Column::new("bio", "text"),
            ],
        )
    }

    #[test]
    fn test_from_columns_derives_metadata() {
        let table = sample_table();
        assert_eq!(table.primary_key.as_deref(), Some("id"));
        assert_eq!(table.unique_columns, vec!["email"]);
        assert_eq!(table.column_names(), vec!["id", "email", "age", "bio"]);
        assert_eq!(table.numeric_columns(), vec!["id", "age"]);
        assert_eq!(table.string_columns(), vec!["email", "bio"]);
        table.validate().unwrap();
    }

    #[test]
    fn test_from_specs_legacy() {
        let table = Table::from_specs(
            "orders",
            vec![
                ColumnSpec::new("id", "integer"),
                ColumnSpec { name: "note".to_owned(), data_type: None, ..ColumnSpec::default() },
            ],
            Some("id".to_owned()),
            Vec::new(),
            IndexMap::new(),
        )
        .unwrap();
        assert_eq!(table.primary_key.as_deref(), Some("id"));
        assert_eq!(table.column("note").unwrap().data_type, "text");
    }

    #[test]
    fn test_validate_rejects_unknown_columns() {
        let mut table = sample_table();
        table.constraints.push(TableConstraint::unique("uk_users_ghost", &["ghost"]));
        assert!(matches!(table.validate(), Err(Error::ColumnNotFound { .. })));
    }

    #[test]
    fn test_with_column_produces_new_value() {
        let table = sample_table();
        let grown = table.clone().with_column(Column::new("status", "varchar(20)"));
        assert_eq!(table.columns.len(), 4);
        assert_eq!(grown.columns.len(), 5);
        assert!(grown.column("status").is_some());
    }

    #[test]
    fn test_column_order_is_insertion_order() {
        let table = sample_table();
        let listed: Vec<_> = table.columns_list().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(listed, vec!["id", "email", "age", "bio"]);
    }
}
