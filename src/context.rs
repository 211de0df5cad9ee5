//! Generation context.
//!
//! A [`Context`] is built per top-level generate call, mutated only during
//! that call's evaluation, and discarded afterwards. It is never shared
//! across threads; concurrent generators each hold their own.

use crate::{grammar::Grammar, schema::Table, types::matches_type_category};
use indexmap::IndexMap;
use rand::{Rng, RngCore, SeedableRng};
use rand_hc::Hc128Rng;
use std::{any::Any, collections::BTreeMap, fmt, rc::Rc};

/// State bag key holding the rule-recursion depth.
pub const DEPTH_KEY: &str = "depth";

/// State bag key counting recursion-ceiling hits.
pub const DEPTH_EXCEEDED_KEY: &str = "depth_exceeded";

/// A value stored in the context's state bag.
///
/// The closed variants cover what grammars actually store (current table,
/// counters, accumulated name lists, small lookup maps); `Opaque` is the
/// escape hatch for plug-in elements carrying richer state.
#[derive(Clone)]
pub enum StateValue {
    /// A string.
    Str(String),
    /// An integer.
    Int(i64),
    /// A list of strings.
    List(Vec<String>),
    /// A string-to-string mapping.
    Map(BTreeMap<String, String>),
    /// Arbitrary plug-in state.
    Opaque(Rc<dyn Any>),
}

impl StateValue {
    /// The string form used when a template placeholder resolves to a bound
    /// state value.
    pub fn render(&self) -> String {
        match self {
            StateValue::Str(s) => s.clone(),
            StateValue::Int(i) => i.to_string(),
            StateValue::List(items) => items.join(", "),
            StateValue::Map(map) => {
                let mut out = String::new();
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(k);
                    out.push('=');
                    out.push_str(v);
                }
                out
            }
            StateValue::Opaque(_) => "<opaque>".to_owned(),
        }
    }

    /// Borrows the string variant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Reads the integer variant.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            StateValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Borrows the list variant.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            StateValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Debug for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Str(s) => write!(f, "Str({s:?})"),
            StateValue::Int(i) => write!(f, "Int({i})"),
            StateValue::List(items) => write!(f, "List({items:?})"),
            StateValue::Map(map) => write!(f, "Map({map:?})"),
            StateValue::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::Str(value.to_owned())
    }
}
impl From<String> for StateValue {
    fn from(value: String) -> Self {
        StateValue::Str(value)
    }
}
impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        StateValue::Int(value)
    }
}
impl From<Vec<String>> for StateValue {
    fn from(value: Vec<String>) -> Self {
        StateValue::List(value)
    }
}
impl From<BTreeMap<String, String>> for StateValue {
    fn from(value: BTreeMap<String, String>) -> Self {
        StateValue::Map(value)
    }
}

/// The external mutable state used during one generate call.
pub struct Context {
    /// The originating seed, observable by lambda elements.
    pub seed: u64,
    /// Known tables, keyed by name.
    pub tables: IndexMap<String, Table>,
    /// Known column names. A hint catalogue, not tied to a table.
    pub fields: Vec<String>,
    rng: Box<dyn RngCore>,
    state: IndexMap<String, StateValue>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("seed", &self.seed)
            .field("tables", &self.tables.len())
            .field("fields", &self.fields)
            .field("rng", &())
            .field("state", &self.state)
            .finish()
    }
}

impl Context {
    /// Creates a context with empty catalogues.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            tables: IndexMap::new(),
            fields: Vec::new(),
            rng: Box::new(Hc128Rng::seed_from_u64(seed)),
            state: IndexMap::new(),
        }
    }

    /// Creates a context carrying a grammar's table and field catalogues.
    pub fn for_grammar(grammar: &Grammar, seed: u64) -> Self {
        let mut ctx = Context::new(seed);
        ctx.tables = grammar.tables().clone();
        ctx.fields = grammar.fields().to_vec();
        ctx
    }

    /// The seeded random number generator. Element code must draw from this
    /// one, never a private RNG, or determinism is lost.
    pub fn rng(&mut self) -> &mut dyn RngCore {
        &mut *self.rng
    }

    /// Reads a state bag entry.
    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.state.get(key)
    }

    /// Writes a state bag entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<StateValue>) {
        self.state.insert(key.into(), value.into());
    }

    /// Removes a state bag entry.
    pub fn remove(&mut self, key: &str) -> Option<StateValue> {
        self.state.shift_remove(key)
    }

    /// Reads a string entry.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(StateValue::as_str)
    }

    /// Reads an integer entry.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(StateValue::as_int)
    }

    /// Appends to a list entry, creating it when absent.
    pub fn list_push(&mut self, key: impl Into<String>, item: impl Into<String>) {
        match self.state.entry(key.into()).or_insert_with(|| StateValue::List(Vec::new())) {
            StateValue::List(items) => items.push(item.into()),
            other => *other = StateValue::List(vec![item.into()]),
        }
    }

    /// Current rule-recursion depth.
    pub fn depth(&self) -> usize {
        self.get_int(DEPTH_KEY).unwrap_or(0).max(0) as usize
    }

    pub(crate) fn push_depth(&mut self) {
        let depth = self.get_int(DEPTH_KEY).unwrap_or(0);
        self.set(DEPTH_KEY, depth + 1);
    }

    pub(crate) fn pop_depth(&mut self) {
        let depth = self.get_int(DEPTH_KEY).unwrap_or(0);
        self.set(DEPTH_KEY, (depth - 1).max(0));
    }

    pub(crate) fn count_depth_overflow(&mut self) {
        let hits = self.get_int(DEPTH_EXCEEDED_KEY).unwrap_or(0);
        self.set(DEPTH_EXCEEDED_KEY, hits + 1);
    }

    /// How many times the recursion ceiling was hit during this call.
    pub fn depth_overflows(&self) -> i64 {
        self.get_int(DEPTH_EXCEEDED_KEY).unwrap_or(0)
    }

    /// Picks a table name from the catalogue, restricted to `preferred`
    /// names when at least one of them exists. Returns `None` when the
    /// catalogue is empty; draws from the RNG otherwise.
    pub fn choose_table_name(&mut self, preferred: &[String]) -> Option<String> {
        let Context { tables, rng, .. } = self;
        if tables.is_empty() {
            return None;
        }
        let candidates: Vec<&str> = if preferred.is_empty() {
            tables.keys().map(String::as_str).collect()
        } else {
            let known: Vec<&str> = preferred
                .iter()
                .filter(|name| tables.contains_key(name.as_str()))
                .map(String::as_str)
                .collect();
            if known.is_empty() {
                tables.keys().map(String::as_str).collect()
            } else {
                known
            }
        };
        let index = rng.gen_range(0..candidates.len());
        Some(candidates[index].to_owned())
    }

    /// Picks a field name. When a type hint is given and a current table is
    /// recorded under the `"table"` state key, the pick is restricted to
    /// that table's matching columns; the hint `"id"` prefers key columns.
    /// Falls back to the flat field catalogue, and to `None` when that is
    /// empty too.
    pub fn choose_field_name(&mut self, filter: Option<&str>) -> Option<String> {
        if let Some(hint) = filter {
            let candidates: Vec<String> = match self.get_str("table").and_then(|t| self.tables.get(t)) {
                Some(table) => {
                    if hint.eq_ignore_ascii_case("id") {
                        table
                            .columns
                            .values()
                            .filter(|c| c.is_primary_key || c.is_unique)
                            .map(|c| c.name.clone())
                            .collect()
                    } else {
                        table
                            .columns
                            .values()
                            .filter(|c| matches_type_category(&c.data_type, hint))
                            .map(|c| c.name.clone())
                            .collect()
                    }
                }
                None => Vec::new(),
            };
            if !candidates.is_empty() {
                let index = self.rng.gen_range(0..candidates.len());
                return Some(candidates[index].clone());
            }
        }
        let Context { fields, rng, .. } = self;
        if fields.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..fields.len());
        Some(fields[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, Table};

    fn ctx_with_tables() -> Context {
        let mut ctx = Context::new(0);
        ctx.tables.insert(
            "users".to_owned(),
            Table::from_columns(
                "users",
                vec![
                    Column::new("id", "integer").not_null().primary_key(),
                    Column::new("email", "varchar(100)").unique(),
                    Column::new("age", "integer"),
                    Column::new("bio", "text"),
                ],
            ),
        );
        ctx
    }

    #[test]
    fn test_state_bag_round_trip() {
        let mut ctx = Context::new(1);
        ctx.set("table", "users");
        ctx.set("count", 3_i64);
        assert_eq!(ctx.get_str("table"), Some("users"));
        assert_eq!(ctx.get_int("count"), Some(3));
        assert!(ctx.get("missing").is_none());
        ctx.list_push("seen", "users");
        ctx.list_push("seen", "orders");
        assert_eq!(
            ctx.get("seen").unwrap().as_list().unwrap(),
            &["users".to_owned(), "orders".to_owned()],
        );
    }

    #[test]
    fn test_depth_bookkeeping() {
        let mut ctx = Context::new(1);
        assert_eq!(ctx.depth(), 0);
        ctx.push_depth();
        ctx.push_depth();
        assert_eq!(ctx.depth(), 2);
        ctx.pop_depth();
        assert_eq!(ctx.depth(), 1);
    }

    #[test]
    fn test_choose_table_name_empty() {
        let mut ctx = Context::new(1);
        assert_eq!(ctx.choose_table_name(&[]), None);
    }

    #[test]
    fn test_choose_table_name_preferred() {
        let mut ctx = ctx_with_tables();
        let preferred = vec!["users".to_owned(), "missing".to_owned()];
        for _ in 0..10 {
            assert_eq!(ctx.choose_table_name(&preferred).as_deref(), Some("users"));
        }
        // unknown preferences fall back to the whole catalogue
        let unknown = vec!["missing".to_owned()];
        assert_eq!(ctx.choose_table_name(&unknown).as_deref(), Some("users"));
    }

    #[test]
    fn test_choose_field_name_filters_by_type() {
        let mut ctx = ctx_with_tables();
        ctx.set("table", "users");
        for _ in 0..10 {
            let numeric = ctx.choose_field_name(Some("int")).unwrap();
            assert!(numeric == "id" || numeric == "age", "{numeric}");
            let keyish = ctx.choose_field_name(Some("id")).unwrap();
            assert!(keyish == "id" || keyish == "email", "{keyish}");
        }
    }

    #[test]
    fn test_choose_field_name_falls_back_to_catalogue() {
        let mut ctx = Context::new(1);
        ctx.fields = vec!["a".to_owned(), "b".to_owned()];
        let picked = ctx.choose_field_name(Some("int")).unwrap();
        assert!(picked == "a" || picked == "b");
        let plain = ctx.choose_field_name(None).unwrap();
        assert!(plain == "a" || plain == "b");
    }

    #[test]
    fn test_state_value_render() {
        assert_eq!(StateValue::from("x").render(), "x");
        assert_eq!(StateValue::from(42_i64).render(), "42");
        assert_eq!(
            StateValue::from(vec!["a".to_owned(), "b".to_owned()]).render(),
            "a, b",
        );
    }
}
