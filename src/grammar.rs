//! Grammars and the grammar registry.
//!
//! A [`Grammar`] is a named, flat map of rules plus table/field catalogues.
//! Composition of several grammars happens by prefixing rule names when
//! importing into a container grammar; the engine itself only ever sees a
//! flat rule map, and cyclic references between grammars are not a concept
//! it knows about.

use crate::{context::Context, element::Element, error::Error, schema::Table};
use indexmap::IndexMap;
use rand::Rng;

/// Fallback emitted when rule recursion hits the depth ceiling.
const MAX_DEPTH_FALLBACK: &str = "SELECT 1";

/// Default recursion ceiling.
const DEFAULT_MAX_DEPTH: usize = 64;

/// The conventional root rule name.
pub const DEFAULT_RULE: &str = "query";

/// A named collection of rules plus table and field catalogues.
#[derive(Debug, Clone)]
pub struct Grammar {
    name: String,
    rules: IndexMap<String, Element>,
    tables: IndexMap<String, Table>,
    fields: Vec<String>,
    strict: bool,
    max_depth: usize,
}

impl Grammar {
    /// Creates an empty grammar.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: IndexMap::new(),
            tables: IndexMap::new(),
            fields: Vec::new(),
            strict: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// The grammar's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Defines or replaces a rule. Plain strings become literal elements.
    pub fn rule(&mut self, name: impl Into<String>, element: impl Into<Element>) -> &mut Self {
        self.rules.insert(name.into(), element.into());
        self
    }

    /// Registers a table in the catalogue.
    pub fn define_table(&mut self, table: Table) -> &mut Self {
        self.tables.insert(table.name.clone(), table);
        self
    }

    /// Registers several tables.
    pub fn define_tables(&mut self, tables: impl IntoIterator<Item = Table>) -> &mut Self {
        for table in tables {
            self.define_table(table);
        }
        self
    }

    /// Registers known field names.
    pub fn define_fields<I>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Turns strict mode on or off. In strict mode missing rules and
    /// unresolved placeholders abort generation instead of surviving
    /// verbatim in the output.
    pub fn set_strict(&mut self, strict: bool) -> &mut Self {
        self.strict = strict;
        self
    }

    /// Whether strict mode is on.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Overrides the rule-recursion ceiling.
    pub fn set_max_depth(&mut self, max_depth: usize) -> &mut Self {
        self.max_depth = max_depth;
        self
    }

    /// The table catalogue.
    pub fn tables(&self) -> &IndexMap<String, Table> {
        &self.tables
    }

    /// The field catalogue.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Rule names in definition order.
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.keys().map(String::as_str).collect()
    }

    /// Whether a rule exists.
    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Generates one string from the named rule.
    ///
    /// With a seed the output is a pure function of (grammar, rule, seed);
    /// without one a seed is drawn from entropy and recorded in the
    /// context, so lambdas still observe a concrete value.
    pub fn generate(&self, rule: &str, seed: Option<u64>) -> Result<String, Error> {
        let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());
        let mut ctx = Context::for_grammar(self, seed);
        self.generate_rule(rule, &mut ctx)
    }

    /// Generates one string from the named rule into an existing context.
    ///
    /// Rule dispatch bumps the depth counter stored under the `"depth"`
    /// state key; at the ceiling a benign fallback literal is emitted and a
    /// counter under `"depth_exceeded"` is incremented, which keeps cyclic
    /// rule graphs terminating.
    pub fn generate_rule(&self, name: &str, ctx: &mut Context) -> Result<String, Error> {
        match self.rules.get(name) {
            Some(element) => {
                if ctx.depth() >= self.max_depth {
                    ctx.count_depth_overflow();
                    return Ok(MAX_DEPTH_FALLBACK.to_owned());
                }
                ctx.push_depth();
                let result = element.generate(self, ctx);
                ctx.pop_depth();
                result
            }
            None if self.strict => Err(Error::UnresolvedRule(name.to_owned())),
            None => Ok(format!("{{{name}}}")),
        }
    }
}

/// A registry mapping names to grammars.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    grammars: IndexMap<String, Grammar>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a grammar under a key.
    pub fn add(&mut self, key: impl Into<String>, grammar: Grammar) -> &mut Self {
        self.grammars.insert(key.into(), grammar);
        self
    }

    /// Removes a grammar.
    pub fn remove(&mut self, key: &str) -> Option<Grammar> {
        self.grammars.shift_remove(key)
    }

    /// Looks up a grammar.
    pub fn get(&self, key: &str) -> Option<&Grammar> {
        self.grammars.get(key)
    }

    /// Registered grammar names, in registration order.
    pub fn list(&self) -> Vec<&str> {
        self.grammars.keys().map(String::as_str).collect()
    }

    /// Returns a lazy stream of `count` statements from a grammar rule.
    ///
    /// With a base seed, statement `i` is generated under seed `base + i`,
    /// so any single statement of a workload can be regenerated on its own.
    /// Unknown grammar names fail fast with the list of available ones.
    pub fn generate(
        &self,
        grammar: &str,
        rule: &str,
        count: u64,
        seed: Option<u64>,
    ) -> Result<GenerateIter<'_>, Error> {
        let Some(found) = self.grammars.get(grammar) else {
            return Err(Error::UnknownGrammar {
                name: grammar.to_owned(),
                available: self.list().join(", "),
            });
        };
        Ok(GenerateIter {
            grammar: found,
            rule: rule.to_owned(),
            base_seed: seed,
            index: 0,
            count,
        })
    }
}

/// Lazy statement stream returned by [`Registry::generate`].
#[derive(Debug)]
pub struct GenerateIter<'a> {
    grammar: &'a Grammar,
    rule: String,
    base_seed: Option<u64>,
    index: u64,
    count: u64,
}

impl Iterator for GenerateIter<'_> {
    type Item = Result<String, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }
        let seed = self.base_seed.map(|base| base.wrapping_add(self.index));
        self.index += 1;
        Some(self.grammar.generate(&self.rule, seed))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.count - self.index) as usize;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{choice, literal, rule_ref, template, Element};

    #[test]
    fn test_literal_rule() {
        let mut grammar = Grammar::new("demo");
        grammar.rule("q", literal("SELECT 1"));
        assert_eq!(grammar.generate("q", Some(0)).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_string_rule_wraps_in_literal() {
        let mut grammar = Grammar::new("demo");
        grammar.rule("q", "SELECT 2");
        assert_eq!(grammar.generate("q", Some(0)).unwrap(), "SELECT 2");
    }

    #[test]
    fn test_missing_rule_non_strict() {
        let grammar = Grammar::new("demo");
        assert_eq!(grammar.generate("nope", Some(0)).unwrap(), "{nope}");
    }

    #[test]
    fn test_missing_rule_strict() {
        let mut grammar = Grammar::new("demo");
        grammar.set_strict(true);
        assert!(matches!(grammar.generate("nope", Some(0)), Err(Error::UnresolvedRule(_))));
    }

    #[test]
    fn test_rule_ref_dispatch() {
        let mut grammar = Grammar::new("demo");
        grammar.rule("value", choice(["1", "2"]).unwrap());
        grammar.rule("q", template("SELECT {value}", Vec::<(&str, Element)>::new()));
        let output = grammar.generate("q", Some(3)).unwrap();
        assert!(output == "SELECT 1" || output == "SELECT 2", "{output}");
    }

    #[test]
    fn test_recursion_is_bounded() {
        let mut grammar = Grammar::new("demo");
        grammar.rule("loop", rule_ref("loop"));
        let output = grammar.generate("loop", Some(0)).unwrap();
        assert_eq!(output, "SELECT 1");
    }

    #[test]
    fn test_determinism_across_calls() {
        let mut grammar = Grammar::new("demo");
        grammar.rule("q", choice(["a", "b", "c", "d"]).unwrap());
        for seed in 0..100 {
            assert_eq!(
                grammar.generate("q", Some(seed)).unwrap(),
                grammar.generate("q", Some(seed)).unwrap(),
            );
        }
    }

    #[test]
    fn test_registry_unknown_grammar() {
        let mut registry = Registry::new();
        registry.add("dml", Grammar::new("dml"));
        let err = registry.generate("ddl", DEFAULT_RULE, 1, None).unwrap_err();
        match err {
            Error::UnknownGrammar { name, available } => {
                assert_eq!(name, "ddl");
                assert_eq!(available, "dml");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_registry_stream_is_seeded_per_statement() {
        let mut grammar = Grammar::new("dml");
        grammar.rule("query", choice(["a", "b", "c", "d", "e", "f"]).unwrap());
        let mut registry = Registry::new();
        registry.add("dml", grammar);

        let first: Vec<String> = registry
            .generate("dml", "query", 20, Some(100))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        let second: Vec<String> = registry
            .generate("dml", "query", 20, Some(100))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(first, second);

        // statement i is reproducible alone under seed base + i
        let grammar = registry.get("dml").unwrap();
        assert_eq!(first[7], grammar.generate("query", Some(107)).unwrap());
    }
}
