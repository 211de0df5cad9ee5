//! Random DDL synthesis.
//!
//! Generates CREATE TABLE / CREATE INDEX / ALTER TABLE statement sequences
//! from a weighted type catalogue. A profile tilts the weights toward a
//! workload flavor, and four ratio knobs control foreign key and index
//! density. Output order respects dependencies: tables first, then their
//! indexes, then cross-table foreign keys.

use crate::{
    error::Error,
    schema::{Column, ConstraintKind, FkAction, Index, IndexMethod, Table, TableConstraint},
};
use indexmap::IndexMap;
use rand::{
    distributions::{Distribution, WeightedIndex},
    seq::{index::sample, SliceRandom},
    Rng, RngCore, SeedableRng,
};
use rand_hc::Hc128Rng;
use serde::{Deserialize, Serialize};
use std::{fmt::Write, str::FromStr};

/// The SQL dialect targeted by generated statements.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Dialect {
    /// PostgreSQL.
    #[default]
    Postgres,
    /// YugabyteDB. Speaks the PostgreSQL surface but without
    /// `NULLS NOT DISTINCT`.
    Yugabyte,
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(dialect: &str) -> Result<Self, Self::Err> {
        match dialect.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "yugabyte" | "yugabytedb" => Ok(Dialect::Yugabyte),
            _ => Err(Error::UnsupportedDialect(dialect.to_owned())),
        }
    }
}

/// A named weight-bias preset for the random type catalogue.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Profile {
    /// OLTP-heavy baseline.
    #[default]
    Core,
    /// JSON and TEXT weights multiplied by 2.5.
    JsonHeavy,
    /// Temporal types boosted 2.5x, numerics 1.5x.
    TimeSeries,
    /// Network types tripled.
    NetworkHeavy,
    /// Weights flattened toward the mean for diversity.
    WideRange,
}

impl FromStr for Profile {
    type Err = Error;

    /// Unknown profile names fall back to the baseline rather than failing.
    fn from_str(profile: &str) -> Result<Self, Self::Err> {
        Ok(match profile.to_ascii_lowercase().as_str() {
            "json_heavy" => Profile::JsonHeavy,
            "time_series" => Profile::TimeSeries,
            "network_heavy" => Profile::NetworkHeavy,
            "wide_range" => Profile::WideRange,
            _ => Profile::Core,
        })
    }
}

/// Density knobs for foreign keys and indexes, each clamped to `0..=1`.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DdlRatios {
    /// Probability that a table gains cross-table foreign keys.
    pub fk: f64,
    /// Scales the per-table index count, `0..=round(1 + 4 * index)`.
    pub index: f64,
    /// Probability that an index is composite (2 to 3 columns).
    pub composite_index: f64,
    /// Probability that an index is partial (carries a WHERE clause).
    pub partial_index: f64,
}

impl Default for DdlRatios {
    fn default() -> Self {
        Self { fk: 0.3, index: 0.7, composite_index: 0.3, partial_index: 0.2 }
    }
}

impl DdlRatios {
    fn clamped(self) -> Self {
        Self {
            fk: self.fk.clamp(0.0, 1.0),
            index: self.index.clamp(0.0, 1.0),
            composite_index: self.composite_index.clamp(0.0, 1.0),
            partial_index: self.partial_index.clamp(0.0, 1.0),
        }
    }
}

/// One entry of the random type catalogue.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SqlType {
    Integer,
    BigInt,
    SmallInt,
    VarChar,
    Text,
    Numeric,
    Decimal,
    Real,
    DoublePrecision,
    Boolean,
    Date,
    Timestamp,
    TimestampTz,
    Time,
    TimeTz,
    Uuid,
    Jsonb,
    Json,
    Bytea,
    Inet,
    Cidr,
    MacAddr,
    Char,
    Money,
    Interval,
    Int4Range,
    Int8Range,
    NumRange,
    DateRange,
    TsRange,
    TsTzRange,
}

impl SqlType {
    /// Renders the concrete SQL type string, drawing size parameters where
    /// the type has them.
    fn render(self, rng: &mut dyn RngCore) -> String {
        match self {
            SqlType::Integer => "INTEGER".to_owned(),
            SqlType::BigInt => "BIGINT".to_owned(),
            SqlType::SmallInt => "SMALLINT".to_owned(),
            SqlType::VarChar => {
                format!("VARCHAR({})", [50, 100, 200, 255].choose(rng).expect("non-empty"))
            }
            SqlType::Text => "TEXT".to_owned(),
            SqlType::Numeric => format!(
                "NUMERIC({},{})",
                rng.gen_range(8..=18),
                [0, 2, 4].choose(rng).expect("non-empty"),
            ),
            SqlType::Decimal => format!(
                "DECIMAL({},{})",
                rng.gen_range(8..=18),
                [0, 2, 4].choose(rng).expect("non-empty"),
            ),
            SqlType::Real => "REAL".to_owned(),
            SqlType::DoublePrecision => "DOUBLE PRECISION".to_owned(),
            SqlType::Boolean => "BOOLEAN".to_owned(),
            SqlType::Date => "DATE".to_owned(),
            SqlType::Timestamp => "TIMESTAMP".to_owned(),
            SqlType::TimestampTz => "TIMESTAMPTZ".to_owned(),
            SqlType::Time => "TIME".to_owned(),
            SqlType::TimeTz => "TIMETZ".to_owned(),
            SqlType::Uuid => "UUID".to_owned(),
            SqlType::Jsonb => "JSONB".to_owned(),
            SqlType::Json => "JSON".to_owned(),
            SqlType::Bytea => "BYTEA".to_owned(),
            SqlType::Inet => "INET".to_owned(),
            SqlType::Cidr => "CIDR".to_owned(),
            SqlType::MacAddr => "MACADDR".to_owned(),
            SqlType::Char => format!("CHAR({})", [1, 2, 10].choose(rng).expect("non-empty")),
            SqlType::Money => "MONEY".to_owned(),
            SqlType::Interval => "INTERVAL".to_owned(),
            SqlType::Int4Range => "INT4RANGE".to_owned(),
            SqlType::Int8Range => "INT8RANGE".to_owned(),
            SqlType::NumRange => "NUMRANGE".to_owned(),
            SqlType::DateRange => "DATERANGE".to_owned(),
            SqlType::TsRange => "TSRANGE".to_owned(),
            SqlType::TsTzRange => "TSTZRANGE".to_owned(),
        }
    }

    fn is_json_like(self) -> bool {
        matches!(self, SqlType::Jsonb | SqlType::Json | SqlType::Text)
    }

    fn is_temporal(self) -> bool {
        matches!(
            self,
            SqlType::TimestampTz | SqlType::Timestamp | SqlType::Date | SqlType::Interval,
        )
    }

    fn is_exact_numeric(self) -> bool {
        matches!(self, SqlType::Numeric | SqlType::Decimal)
    }

    fn is_net(self) -> bool {
        matches!(self, SqlType::Inet | SqlType::Cidr | SqlType::MacAddr)
    }

    /// JSON types are excluded from array wrapping.
    fn is_arrayable(self) -> bool {
        !matches!(self, SqlType::Json | SqlType::Jsonb)
    }
}

/// OLTP-heavy baseline weights.
static BASE_TYPE_WEIGHTS: &[(SqlType, u32)] = &[
    (SqlType::Integer, 18),
    (SqlType::BigInt, 16),
    (SqlType::SmallInt, 3),
    (SqlType::VarChar, 18),
    (SqlType::Text, 8),
    (SqlType::Numeric, 7),
    (SqlType::Decimal, 5),
    (SqlType::Real, 3),
    (SqlType::DoublePrecision, 5),
    (SqlType::Boolean, 10),
    (SqlType::Date, 6),
    (SqlType::Timestamp, 7),
    (SqlType::TimestampTz, 6),
    (SqlType::Time, 2),
    (SqlType::TimeTz, 2),
    (SqlType::Uuid, 6),
    (SqlType::Jsonb, 7),
    (SqlType::Json, 2),
    (SqlType::Bytea, 3),
    (SqlType::Inet, 2),
    (SqlType::Cidr, 1),
    (SqlType::MacAddr, 1),
    (SqlType::Char, 2),
    (SqlType::Money, 1),
    (SqlType::Interval, 2),
    (SqlType::Int4Range, 1),
    (SqlType::Int8Range, 1),
    (SqlType::NumRange, 1),
    (SqlType::DateRange, 1),
    (SqlType::TsRange, 1),
    (SqlType::TsTzRange, 1),
];

fn apply_profile(profile: Profile) -> Vec<(SqlType, u32)> {
    let mut items: Vec<(SqlType, u32)> = BASE_TYPE_WEIGHTS.to_vec();
    let bump = |items: &mut Vec<(SqlType, u32)>, pred: fn(SqlType) -> bool, factor: f64| {
        for (ty, weight) in items.iter_mut() {
            if pred(*ty) {
                *weight = ((f64::from(*weight) * factor) as u32).max(1);
            }
        }
    };
    match profile {
        Profile::Core => {}
        Profile::JsonHeavy => bump(&mut items, SqlType::is_json_like, 2.5),
        Profile::TimeSeries => {
            bump(&mut items, SqlType::is_temporal, 2.5);
            bump(&mut items, SqlType::is_exact_numeric, 1.5);
        }
        Profile::NetworkHeavy => bump(&mut items, SqlType::is_net, 3.0),
        Profile::WideRange => {
            let total: u32 = items.iter().map(|(_, w)| w).sum();
            let mean = (total / items.len() as u32).max(1);
            for (_, weight) in items.iter_mut() {
                *weight = ((*weight + mean) / 2).max(1);
            }
        }
    }
    items
}

/// Generates randomized DDL statement sequences.
#[derive(Debug)]
pub struct DdlGenerator {
    dialect: Dialect,
    ratios: DdlRatios,
    rng: Hc128Rng,
    type_weights: Vec<(SqlType, u32)>,
    type_distr: WeightedIndex<u32>,
    fk_seq: u32,
}

impl DdlGenerator {
    /// Creates a generator for the given profile, dialect, seed and ratio
    /// knobs.
    pub fn new(profile: Profile, dialect: Dialect, seed: u64, ratios: DdlRatios) -> Self {
        let type_weights = apply_profile(profile);
        let type_distr = WeightedIndex::new(type_weights.iter().map(|(_, w)| *w))
            .expect("baseline weights are positive");
        Self {
            dialect,
            ratios: ratios.clamped(),
            rng: Hc128Rng::seed_from_u64(seed),
            type_weights,
            type_distr,
            fk_seq: 0,
        }
    }

    /// Baseline generator: core profile, PostgreSQL, default ratios.
    pub fn with_seed(seed: u64) -> Self {
        Self::new(Profile::Core, Dialect::Postgres, seed, DdlRatios::default())
    }

    /// Draws a random SQL type string from the weighted catalogue, wrapping
    /// it into an array type with probability 0.08.
    pub fn random_data_type(&mut self) -> String {
        let index = self.type_distr.sample(&mut self.rng);
        let ty = self.type_weights[index].0;
        let base = ty.render(&mut self.rng);
        if self.rng.gen_bool(0.08) && ty.is_arrayable() && !base.ends_with("[]") {
            return format!("{base}[]");
        }
        base
    }

    /// Generates a random table definition with columns, constraints and
    /// indexes.
    pub fn generate_random_table(
        &mut self,
        table_name: &str,
        num_columns: Option<u32>,
        num_constraints: Option<u32>,
    ) -> Table {
        let num_columns = num_columns.unwrap_or_else(|| self.rng.gen_range(5..=15));
        let num_constraints = num_constraints.unwrap_or_else(|| self.rng.gen_range(2..=6));

        let mut columns =
            vec![Column::new("id", "INTEGER GENERATED BY DEFAULT AS IDENTITY").not_null()];
        for i in 0..num_columns.saturating_sub(1) {
            let label = ["data", "value", "info", "attr"].choose(&mut self.rng).expect("non-empty");
            let name = format!("col_{label}_{i}");
            let data_type = self.random_data_type();
            let mut column = Column::new(name.clone(), data_type.clone());
            column.is_nullable = *[true, true, false].choose(&mut self.rng).expect("non-empty");
            column.is_unique = self.rng.gen_bool(0.1);
            if self.rng.gen_bool(0.3) {
                if let Some(default) = self.default_for_type(&data_type) {
                    column = column.with_default(default);
                }
            }
            if self.rng.gen_bool(0.2) {
                if let Some(check) = check_for_column(&name, &data_type) {
                    column = column.with_check(check);
                }
            }
            columns.push(column);
        }

        let has_parent = self.rng.gen_bool(0.3);
        if has_parent {
            columns.push(Column::new("parent_id", "INTEGER"));
        }
        let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

        let mut constraints = Vec::new();
        let pool = &column_names[..column_names.len().min(5)];
        if self.rng.gen_bool(0.8) || pool.len() < 2 {
            columns[0].is_primary_key = true;
            constraints.push(TableConstraint::primary_key(None, &["id"]));
        } else {
            let want = self.rng.gen_range(2..=3.min(pool.len()));
            let picked: Vec<&str> = sample(&mut self.rng, pool.len(), want)
                .iter()
                .map(|i| pool[i].as_str())
                .collect();
            constraints
                .push(TableConstraint::primary_key(Some(&format!("pk_{table_name}")), &picked));
        }

        // account for the primary key already added
        let mut remaining = num_constraints.saturating_sub(1);

        if remaining > 0 {
            let uniques = self.rng.gen_range(0..=remaining.min(2));
            for i in 0..uniques {
                let pool = &column_names[1..];
                if pool.is_empty() {
                    break;
                }
                let want = self.rng.gen_range(1..=3.min(pool.len()));
                let picked: Vec<String> = sample(&mut self.rng, pool.len(), want)
                    .iter()
                    .map(|idx| pool[idx].clone())
                    .collect();
                let nulls_not_distinct =
                    self.rng.gen_bool(0.5) && self.dialect == Dialect::Postgres;
                constraints.push(TableConstraint {
                    name: Some(format!("uk_{table_name}_{i}")),
                    columns: picked,
                    kind: ConstraintKind::Unique { nulls_not_distinct },
                });
                remaining -= 1;
                if remaining == 0 {
                    break;
                }
            }
        }

        if remaining > 0 {
            let checks = self.rng.gen_range(0..=remaining.min(2));
            for i in 0..checks {
                if let Some(expression) = table_check(&columns) {
                    constraints.push(TableConstraint::check(&format!("chk_{table_name}_{i}"), expression));
                    remaining -= 1;
                    if remaining == 0 {
                        break;
                    }
                }
            }
        }

        if has_parent {
            let on_delete =
                [FkAction::SetNull, FkAction::Restrict, FkAction::Cascade].choose(&mut self.rng);
            let mut fk = TableConstraint::foreign_key(
                &format!("fk_{table_name}_parent"),
                &["parent_id"],
                table_name,
                &["id"],
                on_delete.copied(),
            );
            if self.rng.gen_bool(0.2) {
                fk = fk.deferrable();
                if let ConstraintKind::ForeignKey { initially_deferred, .. } = &mut fk.kind {
                    *initially_deferred = self.rng.gen_bool(0.5);
                }
            }
            constraints.push(fk);
        }

        let mut indexes = Vec::new();
        let max_indexes = (1.0 + 4.0 * self.ratios.index).round() as u32;
        for i in 0..self.rng.gen_range(0..=max_indexes) {
            let composite = self.rng.gen_bool(self.ratios.composite_index);
            let want = if composite && column_names.len() >= 2 {
                self.rng.gen_range(2..=3.min(column_names.len()))
            } else {
                1
            };
            let picked: Vec<String> = sample(&mut self.rng, column_names.len(), want)
                .iter()
                .map(|idx| column_names[idx].clone())
                .collect();
            let mut index = Index {
                name: format!("idx_{table_name}_{i}"),
                columns: picked,
                unique: self.rng.gen_bool(0.1),
                method: IndexMethod::Btree,
                where_clause: None,
                include_columns: Vec::new(),
            };
            if self.rng.gen_bool(self.ratios.partial_index) {
                index.where_clause = partial_index_predicate(&columns);
            }
            indexes.push(index);
        }

        let mut table = Table::from_columns(table_name, columns);
        table.constraints = constraints;
        table.indexes = indexes;
        table
    }

    /// Renders a CREATE TABLE statement, including table options and an
    /// optional trailing COMMENT ON.
    pub fn generate_create_table(&self, table: &Table) -> String {
        let mut lines = vec![format!("CREATE TABLE {} (", table.name)];
        let mut body = Vec::new();
        for column in table.columns.values() {
            body.push(format!("    {}", column_definition(column)));
        }
        for constraint in &table.constraints {
            body.push(format!("    {}", constraint_definition(constraint)));
        }
        lines.push(body.join(",\n"));
        lines.push(")".to_owned());

        let mut options = Vec::new();
        if let Some(tablespace) = &table.tablespace {
            options.push(format!("TABLESPACE {tablespace}"));
        }
        if let Some(partitioned_by) = &table.partitioned_by {
            options.push(format!("PARTITION BY {partitioned_by}"));
        }
        if let Some(inherits) = &table.inherits {
            options.push(format!("INHERITS ({inherits})"));
        }
        if !options.is_empty() {
            lines.push(options.join(" "));
        }

        let mut sql = lines.join("\n");
        if let Some(comment) = &table.comment {
            let _ = write!(sql, ";\nCOMMENT ON TABLE {} IS '{}'", table.name, comment);
        }
        sql
    }

    /// Renders a CREATE INDEX statement.
    pub fn generate_create_index(&self, table_name: &str, index: &Index) -> String {
        let unique = if index.unique { "UNIQUE " } else { "" };
        let mut sql = format!("CREATE {}INDEX {} ON {}", unique, index.name, table_name);
        if index.method != IndexMethod::Btree {
            let _ = write!(sql, " USING {}", index.method);
        }
        let _ = write!(sql, " ({})", index.columns.join(", "));
        if !index.include_columns.is_empty() {
            let _ = write!(sql, " INCLUDE ({})", index.include_columns.join(", "));
        }
        if let Some(where_clause) = &index.where_clause {
            let _ = write!(sql, " WHERE {where_clause}");
        }
        sql
    }

    /// Generates a complete schema: the curated sample tables first, padded
    /// with random tables, then indexes, then cross-table foreign keys.
    pub fn generate_schema(&mut self, num_tables: usize) -> Vec<String> {
        let samples = sample_tables();
        let mut tables: Vec<Table> = if num_tables <= samples.len() {
            samples.into_iter().take(num_tables).collect()
        } else {
            let mut tables = samples;
            for i in 0..num_tables - tables.len() {
                tables.push(self.generate_random_table(&format!("table_{i}"), None, None));
            }
            tables
        };

        let mut statements = Vec::new();
        for table in &tables {
            statements.push(self.generate_create_table(table));
            for index in &table.indexes {
                statements.push(self.generate_create_index(&table.name, index));
            }
        }
        statements.extend(self.generate_cross_table_fks(&mut tables));
        statements
    }

    /// Adds cross-table foreign keys after all CREATE TABLEs, introducing a
    /// nullable referencing column when no type-compatible one exists.
    fn generate_cross_table_fks(&mut self, tables: &mut [Table]) -> Vec<String> {
        if self.ratios.fk <= 0.0 || tables.len() < 2 {
            return Vec::new();
        }
        // candidate referenced tables: those with an id column
        let id_types: IndexMap<String, String> = tables
            .iter()
            .filter_map(|t| t.column("id").map(|c| (t.name.clone(), c.data_type.clone())))
            .collect();
        if id_types.is_empty() {
            return Vec::new();
        }

        let mut statements = Vec::new();
        for table_index in 0..tables.len() {
            if !self.rng.gen_bool(self.ratios.fk) {
                continue;
            }
            let fk_count = if self.rng.gen_bool(0.7) { 1 } else { 2 };
            for _ in 0..fk_count {
                let table_name = tables[table_index].name.clone();
                let others: Vec<&str> = id_types
                    .keys()
                    .filter(|name| **name != table_name)
                    .map(String::as_str)
                    .collect();
                let Some(ref_table) = others.choose(&mut self.rng).map(|s| (*s).to_owned()) else {
                    continue;
                };
                let ref_type = id_types[&ref_table].clone();
                let ref_base = ref_type.split('(').next().unwrap_or(&ref_type);

                let candidates: Vec<String> = tables[table_index]
                    .columns
                    .values()
                    .filter(|c| {
                        c.name != "id" && c.data_type.split('(').next().unwrap_or("") == ref_base
                    })
                    .map(|c| c.name.clone())
                    .collect();

                let column = if !candidates.is_empty() && self.rng.gen_bool(0.7) {
                    candidates.choose(&mut self.rng).expect("non-empty").clone()
                } else {
                    let base = format!("{ref_table}_id");
                    let mut name = base.clone();
                    let mut suffix = 2;
                    while tables[table_index].columns.contains_key(&name) {
                        name = format!("{base}_{suffix}");
                        suffix += 1;
                    }
                    statements
                        .push(format!("ALTER TABLE {table_name} ADD COLUMN {name} {ref_type}"));
                    tables[table_index] = tables[table_index]
                        .clone()
                        .with_column(Column::new(name.clone(), ref_type.clone()));
                    name
                };

                self.fk_seq += 1;
                let constraint = format!("fk_{table_name}_{ref_table}_{}", self.fk_seq);
                let action = ["RESTRICT", "SET NULL", "CASCADE"]
                    .choose(&mut self.rng)
                    .expect("non-empty");
                tables[table_index]
                    .foreign_keys
                    .insert(column.clone(), format!("{ref_table}.id"));
                statements.push(format!(
                    "ALTER TABLE {table_name} ADD CONSTRAINT {constraint} \
                     FOREIGN KEY ({column}) REFERENCES {ref_table}(id) ON DELETE {action}",
                ));
            }
        }
        statements
    }

    /// Generates safe, non-destructive ALTER TABLE statements for an
    /// existing table: ADD COLUMN, SET/DROP DEFAULT, ADD CHECK, ADD UNIQUE.
    /// The table value is updated in step so callers keep metadata in sync.
    pub fn generate_alter_table_statements(
        &mut self,
        table: &mut Table,
        max_alters: usize,
    ) -> Vec<String> {
        #[derive(Copy, Clone)]
        enum Alter {
            AddColumn,
            AlterDefault,
            AddCheck,
            AddUnique,
        }
        let actions = [Alter::AddColumn, Alter::AlterDefault, Alter::AddCheck, Alter::AddUnique];

        let pk_columns: Vec<String> = table
            .constraints
            .iter()
            .filter(|c| matches!(c.kind, ConstraintKind::PrimaryKey))
            .flat_map(|c| c.columns.iter().cloned())
            .chain(table.primary_key.iter().cloned())
            .collect();

        let mut statements = Vec::new();
        for _ in 0..max_alters {
            match actions.choose(&mut self.rng).expect("non-empty") {
                Alter::AddColumn => {
                    let base = format!("new_col_{}", self.rng.gen_range(1..=1_000_000));
                    let mut name = base.clone();
                    let mut suffix = 2;
                    while table.columns.contains_key(&name) {
                        name = format!("{base}_{suffix}");
                        suffix += 1;
                    }
                    let data_type = self.random_data_type();
                    let default = if self.rng.gen_bool(0.3) {
                        self.default_for_type(&data_type)
                    } else {
                        None
                    };
                    let mut sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table.name, name, data_type);
                    // new columns stay nullable so the ALTER succeeds on
                    // populated tables
                    if let Some(default) = &default {
                        let _ = write!(sql, " DEFAULT {default}");
                    }
                    statements.push(sql);
                    let mut column = Column::new(name, data_type);
                    if let Some(default) = default {
                        column = column.with_default(default);
                    }
                    *table = table.clone().with_column(column);
                }
                Alter::AlterDefault => {
                    let candidates: Vec<String> = table
                        .columns
                        .keys()
                        .filter(|name| !pk_columns.contains(name))
                        .cloned()
                        .collect();
                    let Some(name) = candidates.choose(&mut self.rng).cloned() else {
                        continue;
                    };
                    let (data_type, has_default) = {
                        let column = &table.columns[&name];
                        (column.data_type.clone(), column.default.is_some())
                    };
                    if !has_default && self.rng.gen_bool(0.7) {
                        let Some(default) = self.default_for_type(&data_type) else {
                            continue;
                        };
                        statements.push(format!(
                            "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {}",
                            table.name, name, default,
                        ));
                        if let Some(column) = table.columns.get_mut(&name) {
                            column.default = Some(default);
                            column.has_default = true;
                        }
                    } else {
                        statements.push(format!(
                            "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT",
                            table.name, name,
                        ));
                        if let Some(column) = table.columns.get_mut(&name) {
                            column.default = None;
                            column.has_default = false;
                        }
                    }
                }
                Alter::AddCheck => {
                    let numeric: Vec<String> = table
                        .columns
                        .values()
                        .filter(|c| is_checkable_numeric(&c.data_type))
                        .map(|c| c.name.clone())
                        .collect();
                    let Some(column) = numeric.choose(&mut self.rng) else {
                        continue;
                    };
                    let constraint = format!("chk_{}_{}", table.name, self.rng.gen_range(1..=1_000_000));
                    statements.push(format!(
                        "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({} >= 0)",
                        table.name, constraint, column,
                    ));
                }
                Alter::AddUnique => {
                    if table.columns.is_empty() {
                        continue;
                    }
                    let want = if self.rng.gen_bool(0.7) { 1 } else { 2.min(table.columns.len()) };
                    let names: Vec<&String> = table.columns.keys().collect();
                    let picked: Vec<String> = sample(&mut self.rng, names.len(), want)
                        .iter()
                        .map(|i| names[i].clone())
                        .collect();
                    let constraint = format!("uk_{}_{}", table.name, self.rng.gen_range(1..=1_000_000));
                    statements.push(format!(
                        "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
                        table.name, constraint, picked.join(", "),
                    ));
                }
            }
        }
        statements
    }

    /// Synthesizes a DDL-legal default value for a type, mirroring the
    /// value generator's vocabulary. Types with no safe default yield
    /// `None`.
    fn default_for_type(&mut self, data_type: &str) -> Option<String> {
        if let Some(base) = data_type.strip_suffix("[]") {
            return match base {
                "INTEGER" | "BIGINT" | "SMALLINT" => Some("ARRAY[1,2,3]".to_owned()),
                "TEXT" => Some("ARRAY['a','b']".to_owned()),
                base if base.starts_with("VARCHAR") => Some("ARRAY['a','b']".to_owned()),
                base if base.starts_with("NUMERIC") || base.starts_with("DECIMAL") => {
                    Some("ARRAY[1.0,2.0]".to_owned())
                }
                _ => None,
            };
        }
        if data_type.contains("RANGE") || data_type == "INTERVAL" {
            return None;
        }
        if data_type.contains("INT") {
            return Some(self.rng.gen_range(0..=100).to_string());
        }
        if data_type.contains("VARCHAR") || data_type.contains("TEXT") || data_type.starts_with("CHAR") {
            return Some("'default'".to_owned());
        }
        if data_type.contains("BOOL") {
            return Some((*["true", "false"].choose(&mut self.rng).expect("non-empty")).to_owned());
        }
        if data_type.contains("TIMESTAMP") {
            return Some("CURRENT_TIMESTAMP".to_owned());
        }
        if data_type.contains("DATE") {
            return Some("CURRENT_DATE".to_owned());
        }
        if data_type.contains("DECIMAL") || data_type.contains("NUMERIC") {
            return Some("0.00".to_owned());
        }
        match data_type {
            "UUID" => Some("gen_random_uuid()".to_owned()),
            "JSONB" => Some("'{}'::jsonb".to_owned()),
            "JSON" => Some("'{}'::json".to_owned()),
            "INET" => Some("'127.0.0.1'::inet".to_owned()),
            "CIDR" => Some("'10.0.0.0/8'::cidr".to_owned()),
            "MACADDR" => Some("'08:00:2b:01:02:03'".to_owned()),
            "MONEY" => Some("0".to_owned()),
            _ => None,
        }
    }
}

/// Whether a type can carry a numeric `>= 0` check.
fn is_checkable_numeric(data_type: &str) -> bool {
    !data_type.ends_with("[]")
        && !data_type.contains("RANGE")
        && data_type != "INTERVAL"
        && (data_type.contains("INT") || data_type.contains("DECIMAL") || data_type.contains("NUMERIC"))
}

/// Column-level CHECK expression for the given type.
fn check_for_column(name: &str, data_type: &str) -> Option<String> {
    if data_type.ends_with("[]") {
        return Some(format!("array_length({name}, 1) >= 0"));
    }
    if is_checkable_numeric(data_type) {
        return Some(format!("{name} >= 0"));
    }
    if data_type.contains("VARCHAR") || data_type.starts_with("CHAR") {
        return Some(format!("LENGTH({name}) > 0"));
    }
    None
}

/// Table-level CHECK over the first two comparable numeric columns.
fn table_check(columns: &[Column]) -> Option<String> {
    let numeric: Vec<&str> = columns
        .iter()
        .filter(|c| is_checkable_numeric(&c.data_type))
        .map(|c| c.name.as_str())
        .collect();
    if numeric.len() >= 2 {
        Some(format!("{} <= {}", numeric[0], numeric[1]))
    } else {
        None
    }
}

/// WHERE clause for a partial index: a boolean column, a NOT NULL on a
/// string, or a JSON IS NOT NULL, in that order of preference.
fn partial_index_predicate(columns: &[Column]) -> Option<String> {
    if let Some(column) = columns.iter().find(|c| c.data_type.contains("BOOL")) {
        return Some(format!("{} = true", column.name));
    }
    if let Some(column) = columns
        .iter()
        .find(|c| c.data_type.contains("VARCHAR") || c.data_type.starts_with("CHAR"))
    {
        return Some(format!("{} IS NOT NULL", column.name));
    }
    if let Some(column) =
        columns.iter().find(|c| c.data_type == "JSONB" || c.data_type == "JSON")
    {
        return Some(format!("{} IS NOT NULL", column.name));
    }
    None
}

fn column_definition(column: &Column) -> String {
    let mut parts = vec![column.name.clone(), column.data_type.clone()];
    if !column.is_nullable {
        parts.push("NOT NULL".to_owned());
    }
    if let Some(default) = &column.default {
        parts.push(format!("DEFAULT {default}"));
    }
    if column.is_unique {
        parts.push("UNIQUE".to_owned());
    }
    if let Some(check) = &column.check {
        parts.push(format!("CHECK ({check})"));
    }
    if let Some(target) = &column.foreign_key {
        let rendered = match target.split_once('.') {
            Some((table, col)) => format!("REFERENCES {table}({col})"),
            None => format!("REFERENCES {target}"),
        };
        parts.push(rendered);
        if let Some(action) = column.on_delete {
            parts.push(format!("ON DELETE {action}"));
        }
        if let Some(action) = column.on_update {
            parts.push(format!("ON UPDATE {action}"));
        }
    }
    parts.join(" ")
}

fn constraint_definition(constraint: &TableConstraint) -> String {
    let mut parts = Vec::new();
    if let Some(name) = &constraint.name {
        parts.push(format!("CONSTRAINT {name}"));
    }
    match &constraint.kind {
        ConstraintKind::PrimaryKey => {
            parts.push(format!("PRIMARY KEY ({})", constraint.columns.join(", ")));
        }
        ConstraintKind::Unique { nulls_not_distinct } => {
            let modifier = if *nulls_not_distinct { "NULLS NOT DISTINCT " } else { "" };
            parts.push(format!("UNIQUE {}({})", modifier, constraint.columns.join(", ")));
        }
        ConstraintKind::Check { expression } => {
            parts.push(format!("CHECK ({expression})"));
        }
        ConstraintKind::ForeignKey {
            references_table,
            references_columns,
            on_delete,
            on_update,
            deferrable,
            initially_deferred,
        } => {
            parts.push(format!("FOREIGN KEY ({})", constraint.columns.join(", ")));
            parts.push(format!("REFERENCES {references_table}"));
            if !references_columns.is_empty() {
                parts.push(format!("({})", references_columns.join(", ")));
            }
            if let Some(action) = on_delete {
                parts.push(format!("ON DELETE {action}"));
            }
            if let Some(action) = on_update {
                parts.push(format!("ON UPDATE {action}"));
            }
            if *deferrable {
                parts.push("DEFERRABLE".to_owned());
                if *initially_deferred {
                    parts.push("INITIALLY DEFERRED".to_owned());
                }
            }
        }
    }
    parts.join(" ")
}

/// The curated sample schema: seven related tables exercising composite
/// keys, partial and covering indexes, GIN on JSONB and a partitioned log.
pub fn sample_tables() -> Vec<Table> {
    let mut tables = Vec::new();

    let mut users = Table::from_columns(
        "users",
        vec![
            Column::new("id", "INTEGER GENERATED BY DEFAULT AS IDENTITY").not_null().primary_key(),
            Column::new("username", "VARCHAR(50)").not_null().unique(),
            Column::new("email", "VARCHAR(100)").not_null(),
            Column::new("first_name", "VARCHAR(50)").not_null(),
            Column::new("last_name", "VARCHAR(50)").not_null(),
            Column::new("age", "INTEGER").with_check("age >= 18 AND age <= 120"),
            Column::new("phone", "VARCHAR(20)"),
            Column::new("status", "VARCHAR(20)")
                .not_null()
                .with_default("'active'")
                .with_check("status IN ('active', 'inactive', 'suspended', 'deleted')"),
            Column::new("created_at", "TIMESTAMP").not_null().with_default("CURRENT_TIMESTAMP"),
            Column::new("updated_at", "TIMESTAMP").not_null().with_default("CURRENT_TIMESTAMP"),
        ],
    );
    users.constraints = vec![
        TableConstraint::primary_key(None, &["id"]),
        TableConstraint::unique("uk_users_email_status", &["email", "status"]),
        TableConstraint::check("chk_users_names", "first_name != last_name"),
    ];
    users.indexes = vec![
        Index::new("idx_users_email", &["email"]),
        Index::new("idx_users_status_created", &["status", "created_at"]),
        Index::new("idx_users_fullname", &["last_name", "first_name"]),
    ];
    tables.push(users);

    let mut categories = Table::from_columns(
        "categories",
        vec![
            Column::new("id", "INTEGER GENERATED BY DEFAULT AS IDENTITY").not_null().primary_key(),
            Column::new("name", "VARCHAR(200)").not_null().unique(),
            Column::new("parent_id", "INTEGER"),
        ],
    );
    categories.constraints = vec![
        TableConstraint::primary_key(None, &["id"]),
        TableConstraint::foreign_key(
            "fk_categories_parent",
            &["parent_id"],
            "categories",
            &["id"],
            Some(FkAction::SetNull),
        ),
    ];
    categories.indexes = vec![Index::new("idx_categories_parent", &["parent_id"])];
    tables.push(categories);

    let mut addresses = Table::from_columns(
        "addresses",
        vec![
            Column::new("id", "INTEGER GENERATED BY DEFAULT AS IDENTITY").not_null().primary_key(),
            Column::new("user_id", "INTEGER"),
            Column::new("line1", "VARCHAR(200)").not_null(),
            Column::new("line2", "VARCHAR(200)"),
            Column::new("city", "VARCHAR(100)").not_null(),
            Column::new("state", "VARCHAR(100)"),
            Column::new("postal_code", "VARCHAR(20)"),
            Column::new("country", "VARCHAR(100)").not_null(),
        ],
    );
    addresses.constraints = vec![
        TableConstraint::primary_key(None, &["id"]),
        TableConstraint::foreign_key(
            "fk_addresses_user",
            &["user_id"],
            "users",
            &["id"],
            Some(FkAction::SetNull),
        ),
    ];
    addresses.indexes = vec![Index::new("idx_addresses_user", &["user_id"])];
    tables.push(addresses);

    let mut products = Table::from_columns(
        "products",
        vec![
            Column::new("id", "INTEGER GENERATED BY DEFAULT AS IDENTITY").not_null().primary_key(),
            Column::new("sku", "VARCHAR(50)").not_null(),
            Column::new("name", "VARCHAR(200)").not_null(),
            Column::new("description", "TEXT"),
            Column::new("category_id", "INTEGER").not_null(),
            Column::new("price", "DECIMAL(10,2)").not_null().with_check("price > 0"),
            Column::new("cost", "DECIMAL(10,2)").with_check("cost >= 0"),
            Column::new("quantity", "INTEGER").not_null().with_default("0").with_check("quantity >= 0"),
            Column::new("min_quantity", "INTEGER").with_default("0"),
            Column::new("max_quantity", "INTEGER"),
            Column::new("is_active", "BOOLEAN").not_null().with_default("true"),
            Column::new("created_by", "INTEGER").not_null(),
            Column::new("created_at", "TIMESTAMP").not_null().with_default("CURRENT_TIMESTAMP"),
        ],
    );
    products.constraints = vec![
        TableConstraint::primary_key(None, &["id"]),
        TableConstraint::unique("uk_products_sku", &["sku"]),
        TableConstraint::unique("uk_products_name_category", &["name", "category_id"]),
        TableConstraint::check("chk_products_quantities", "min_quantity <= max_quantity"),
        TableConstraint::check("chk_products_profit", "price > cost OR cost IS NULL"),
        TableConstraint::foreign_key(
            "fk_products_category",
            &["category_id"],
            "categories",
            &["id"],
            Some(FkAction::Restrict),
        ),
        TableConstraint::foreign_key(
            "fk_products_creator",
            &["created_by"],
            "users",
            &["id"],
            Some(FkAction::Restrict),
        ),
    ];
    products.indexes = vec![
        Index::new("idx_products_category", &["category_id"]),
        Index::new("idx_products_active_category", &["category_id", "is_active"])
            .partial("is_active = true"),
        Index::new("idx_products_price", &["price"]).include(&["name", "sku"]),
    ];
    tables.push(products);

    let mut orders = Table::from_columns(
        "orders",
        vec![
            Column::new("order_date", "DATE").not_null(),
            Column::new("order_number", "INTEGER").not_null(),
            Column::new("customer_id", "INTEGER").not_null(),
            Column::new("status", "VARCHAR(20)").not_null().with_default("'pending'"),
            Column::new("total_amount", "DECIMAL(12,2)").not_null().with_check("total_amount >= 0"),
            Column::new("tax_amount", "DECIMAL(10,2)").with_default("0"),
            Column::new("discount_amount", "DECIMAL(10,2)").with_default("0"),
            Column::new("shipping_address_id", "INTEGER"),
            Column::new("billing_address_id", "INTEGER"),
            Column::new("notes", "TEXT"),
            Column::new("created_at", "TIMESTAMP").not_null().with_default("CURRENT_TIMESTAMP"),
            Column::new("updated_at", "TIMESTAMP").not_null().with_default("CURRENT_TIMESTAMP"),
        ],
    );
    orders.constraints = vec![
        TableConstraint::primary_key(Some("pk_orders"), &["order_date", "order_number"]),
        TableConstraint::foreign_key(
            "fk_orders_customer",
            &["customer_id"],
            "users",
            &["id"],
            Some(FkAction::Restrict),
        ),
        TableConstraint::foreign_key(
            "fk_orders_shipping",
            &["shipping_address_id"],
            "addresses",
            &["id"],
            Some(FkAction::SetNull),
        ),
        TableConstraint::foreign_key(
            "fk_orders_billing",
            &["billing_address_id"],
            "addresses",
            &["id"],
            Some(FkAction::SetNull),
        ),
        TableConstraint::check("chk_orders_amounts", "total_amount >= (tax_amount + discount_amount)"),
    ];
    orders.indexes = vec![
        Index::new("idx_orders_customer_date", &["customer_id", "order_date"]),
        Index::new("idx_orders_status", &["status"]).partial("status != 'completed'"),
        Index::new("uk_orders_date_customer", &["order_date", "customer_id", "order_number"])
            .unique(),
    ];
    tables.push(orders);

    let mut order_items = Table::from_columns(
        "order_items",
        vec![
            Column::new("order_date", "DATE").not_null(),
            Column::new("order_number", "INTEGER").not_null(),
            Column::new("line_number", "INTEGER").not_null(),
            Column::new("product_id", "INTEGER").not_null(),
            Column::new("quantity", "INTEGER").not_null().with_check("quantity > 0"),
            Column::new("unit_price", "DECIMAL(10,2)").not_null().with_check("unit_price >= 0"),
            Column::new("discount_percent", "DECIMAL(5,2)")
                .with_default("0")
                .with_check("discount_percent >= 0 AND discount_percent <= 100"),
            Column::new("tax_rate", "DECIMAL(5,2)")
                .with_default("0")
                .with_check("tax_rate >= 0 AND tax_rate <= 100"),
        ],
    );
    order_items.constraints = vec![
        TableConstraint::primary_key(
            Some("pk_order_items"),
            &["order_date", "order_number", "line_number"],
        ),
        TableConstraint::foreign_key(
            "fk_order_items_order",
            &["order_date", "order_number"],
            "orders",
            &["order_date", "order_number"],
            Some(FkAction::Cascade),
        ),
        TableConstraint::foreign_key(
            "fk_order_items_product",
            &["product_id"],
            "products",
            &["id"],
            Some(FkAction::Restrict),
        ),
    ];
    order_items.indexes = vec![
        Index::new("idx_order_items_product", &["product_id"]),
        Index::new("idx_order_items_order", &["order_date", "order_number"]),
    ];
    tables.push(order_items);

    let mut audit_log = Table::from_columns(
        "audit_log",
        vec![
            Column::new("id", "BIGINT GENERATED BY DEFAULT AS IDENTITY").not_null().primary_key(),
            Column::new("table_name", "VARCHAR(50)").not_null(),
            Column::new("record_id", "VARCHAR(100)").not_null(),
            Column::new("action", "VARCHAR(10)")
                .not_null()
                .with_check("action IN ('INSERT', 'UPDATE', 'DELETE')"),
            Column::new("user_id", "INTEGER"),
            Column::new("changed_data", "JSONB"),
            Column::new("ip_address", "INET"),
            Column::new("user_agent", "TEXT"),
            Column::new("created_at", "TIMESTAMP").not_null().with_default("CURRENT_TIMESTAMP"),
        ],
    );
    audit_log.constraints = vec![
        TableConstraint::primary_key(None, &["id"]),
        TableConstraint::foreign_key(
            "fk_audit_user",
            &["user_id"],
            "users",
            &["id"],
            Some(FkAction::SetNull),
        )
        .deferrable(),
    ];
    audit_log.indexes = vec![
        Index::new("idx_audit_table_record", &["table_name", "record_id"]),
        Index::new("idx_audit_user_date", &["user_id", "created_at"]),
        Index::new("idx_audit_recent_deletes", &["table_name", "created_at"])
            .partial("action = 'DELETE' AND created_at > CURRENT_DATE - INTERVAL '30 days'"),
        Index::new("idx_audit_data_gin", &["changed_data"]).using(IndexMethod::Gin),
    ];
    audit_log.partitioned_by = Some("RANGE (created_at)".to_owned());
    tables.push(audit_log);

    tables
}
