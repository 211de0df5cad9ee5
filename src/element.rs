//! The generation AST and its evaluator.
//!
//! An [`Element`] is one node of a grammar's generation tree. Evaluation is
//! a pure function of the element tree, the grammar and the seeded context:
//! no clock, no process id, no environment reads. Each variant consumes a
//! fixed number of RNG draws, so reshuffling a subtree only affects its own
//! slice of the random stream.

use crate::{context::Context, error::Error, grammar::Grammar};
use indexmap::IndexMap;
use rand::Rng;
use std::{fmt, rc::Rc};

/// Emitted when a table element finds an empty catalogue.
const FALLBACK_TABLE: &str = "t0";

/// Emitted when a field element finds an empty catalogue.
const FALLBACK_FIELD: &str = "c0";

/// A node in the generation AST.
#[derive(Debug, Clone)]
pub enum Element {
    /// Emits the string verbatim.
    Literal(String),
    /// Weighted or uniform pick among options.
    Choice(Choice),
    /// Placeholder substitution over a pattern string.
    Template(Template),
    /// Emits the inner element with probability `p`, else nothing.
    Optional(Optional),
    /// Emits `k` copies of the inner element joined by a separator.
    Repeat(Repeat),
    /// Arbitrary generation over the context.
    Lambda(Lambda),
    /// Indirection to a named rule of the grammar.
    RuleRef(String),
    /// Picks a table name from the context catalogue.
    Table(TablePick),
    /// Picks a field name from the context catalogue.
    Field(FieldPick),
    /// Emits an integer in an inclusive range as a decimal string.
    Number(NumberRange),
    /// Emits a single digit `0..=9`.
    Digit,
}

/// Payload of [`Element::Choice`].
///
/// For weighted choices the cumulative weights are precomputed once at
/// construction and binary-searched per pick.
#[derive(Debug, Clone)]
pub struct Choice {
    options: Vec<Element>,
    cumulative: Vec<u64>,
}

impl Choice {
    fn pick<'a>(&'a self, ctx: &mut Context) -> &'a Element {
        let index = if self.cumulative.is_empty() {
            ctx.rng().gen_range(0..self.options.len())
        } else {
            let total = *self.cumulative.last().expect("non-empty cumulative");
            let draw = ctx.rng().gen_range(0..total);
            self.cumulative.partition_point(|&bound| bound <= draw)
        };
        &self.options[index]
    }
}

/// Payload of [`Element::Template`].
#[derive(Debug, Clone)]
pub struct Template {
    pattern: String,
    bindings: IndexMap<String, Element>,
}

impl Template {
    fn expand(&self, grammar: &Grammar, ctx: &mut Context) -> Result<String, Error> {
        let mut out = String::with_capacity(self.pattern.len());
        let mut rest = self.pattern.as_str();
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('}') {
                Some(end) if is_placeholder(&after[..end]) => {
                    let body = &after[..end];
                    out.push_str(&self.resolve(body, grammar, ctx)?);
                    rest = &after[end + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Resolves one placeholder body. For the `{name:binding}` form the
    /// substitution source is the name after the colon. Lookup order is
    /// bindings, then context state, then grammar rules; unresolved
    /// placeholders survive verbatim unless the grammar is strict.
    fn resolve(&self, body: &str, grammar: &Grammar, ctx: &mut Context) -> Result<String, Error> {
        let key = match body.split_once(':') {
            Some((_, alias)) => alias,
            None => body,
        };
        if let Some(element) = self.bindings.get(key) {
            return element.generate(grammar, ctx);
        }
        if let Some(value) = ctx.get(key) {
            return Ok(value.render());
        }
        if grammar.has_rule(key) {
            return grammar.generate_rule(key, ctx);
        }
        if grammar.is_strict() {
            Err(Error::UnresolvedPlaceholder(key.to_owned()))
        } else {
            Ok(format!("{{{body}}}"))
        }
    }
}

fn is_placeholder(body: &str) -> bool {
    !body.is_empty()
        && body.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Payload of [`Element::Optional`].
#[derive(Debug, Clone)]
pub struct Optional {
    inner: Box<Element>,
    probability: f64,
}

/// Payload of [`Element::Repeat`].
#[derive(Debug, Clone)]
pub struct Repeat {
    inner: Box<Element>,
    min: u32,
    max: u32,
    separator: String,
}

/// Payload of [`Element::Lambda`]: an opaque callable over the context.
///
/// Must be a pure function of the context; it may read and write the state
/// bag and draw from the context RNG, nothing else.
#[derive(Clone)]
pub struct Lambda(Rc<dyn Fn(&mut Context) -> String>);

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Lambda(..)")
    }
}

/// Payload of [`Element::Table`].
#[derive(Debug, Clone)]
pub struct TablePick {
    preferred: Vec<String>,
}

/// Payload of [`Element::Field`].
#[derive(Debug, Clone)]
pub struct FieldPick {
    filter: Option<String>,
}

/// Payload of [`Element::Number`].
#[derive(Debug, Clone)]
pub struct NumberRange {
    lo: i64,
    hi: i64,
}

impl Element {
    /// Evaluates the element to a string.
    ///
    /// Identical (element tree, grammar, seed) inputs produce identical
    /// output.
    pub fn generate(&self, grammar: &Grammar, ctx: &mut Context) -> Result<String, Error> {
        match self {
            Element::Literal(text) => Ok(text.clone()),
            Element::Choice(choice) => {
                let picked = choice.pick(ctx);
                picked.generate(grammar, ctx)
            }
            Element::Template(template) => template.expand(grammar, ctx),
            Element::Optional(optional) => {
                if ctx.rng().gen_bool(optional.probability) {
                    optional.inner.generate(grammar, ctx)
                } else {
                    Ok(String::new())
                }
            }
            Element::Repeat(repeat) => {
                let count = ctx.rng().gen_range(repeat.min..=repeat.max);
                let mut parts = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    parts.push(repeat.inner.generate(grammar, ctx)?);
                }
                Ok(parts.join(&repeat.separator))
            }
            Element::Lambda(lambda) => Ok((lambda.0)(ctx)),
            Element::RuleRef(name) => grammar.generate_rule(name, ctx),
            Element::Table(pick) => Ok(ctx
                .choose_table_name(&pick.preferred)
                .unwrap_or_else(|| FALLBACK_TABLE.to_owned())),
            Element::Field(pick) => Ok(ctx
                .choose_field_name(pick.filter.as_deref())
                .unwrap_or_else(|| FALLBACK_FIELD.to_owned())),
            Element::Number(range) => Ok(ctx.rng().gen_range(range.lo..=range.hi).to_string()),
            Element::Digit => Ok(ctx.rng().gen_range(0..=9_u32).to_string()),
        }
    }
}

impl From<&str> for Element {
    fn from(text: &str) -> Self {
        Element::Literal(text.to_owned())
    }
}

impl From<String> for Element {
    fn from(text: String) -> Self {
        Element::Literal(text)
    }
}

impl From<i64> for Element {
    fn from(value: i64) -> Self {
        Element::Literal(value.to_string())
    }
}

/// A literal string element.
pub fn literal(text: impl Into<String>) -> Element {
    Element::Literal(text.into())
}

/// A uniform choice among options. Non-element option values are emitted in
/// their string form.
pub fn choice<I>(options: I) -> Result<Element, Error>
where
    I: IntoIterator,
    I::Item: Into<Element>,
{
    let options: Vec<Element> = options.into_iter().map(Into::into).collect();
    if options.is_empty() {
        return Err(Error::EmptyChoice);
    }
    Ok(Element::Choice(Choice { options, cumulative: Vec::new() }))
}

/// A weighted choice. The pick is a cumulative-distribution draw over the
/// normalized weights.
pub fn weighted<I>(options: I, weights: &[u32]) -> Result<Element, Error>
where
    I: IntoIterator,
    I::Item: Into<Element>,
{
    let options: Vec<Element> = options.into_iter().map(Into::into).collect();
    if options.is_empty() {
        return Err(Error::EmptyChoice);
    }
    if options.len() != weights.len() {
        return Err(Error::WeightCountMismatch {
            options: options.len(),
            weights: weights.len(),
        });
    }
    let mut cumulative = Vec::with_capacity(weights.len());
    let mut total = 0_u64;
    for &weight in weights {
        total += u64::from(weight);
        cumulative.push(total);
    }
    if total == 0 {
        return Err(Error::ZeroTotalWeight);
    }
    Ok(Element::Choice(Choice { options, cumulative }))
}

/// A template over a pattern with `{name}` / `{name:binding}` placeholders.
pub fn template<P, K, I>(pattern: P, bindings: I) -> Element
where
    P: Into<String>,
    K: Into<String>,
    I: IntoIterator<Item = (K, Element)>,
{
    Element::Template(Template {
        pattern: pattern.into(),
        bindings: bindings.into_iter().map(|(k, v)| (k.into(), v)).collect(),
    })
}

/// Emits `inner` with the given probability, the empty string otherwise.
pub fn optional(inner: impl Into<Element>, probability: f64) -> Result<Element, Error> {
    if !(0.0..=1.0).contains(&probability) {
        return Err(Error::InvalidProbability(probability));
    }
    Ok(Element::Optional(Optional { inner: Box::new(inner.into()), probability }))
}

/// Emits between `min` and `max` copies of `inner`, joined by `separator`.
pub fn repeat(
    inner: impl Into<Element>,
    min: u32,
    max: u32,
    separator: impl Into<String>,
) -> Result<Element, Error> {
    if min > max {
        return Err(Error::InvalidRange { lo: i64::from(min), hi: i64::from(max) });
    }
    Ok(Element::Repeat(Repeat {
        inner: Box::new(inner.into()),
        min,
        max,
        separator: separator.into(),
    }))
}

/// An opaque generation function. The escape hatch used by schema-aware
/// primitives.
pub fn lambda(f: impl Fn(&mut Context) -> String + 'static) -> Element {
    Element::Lambda(Lambda(Rc::new(f)))
}

/// A reference to a named rule, resolved through the grammar at generation
/// time.
pub fn rule_ref(name: impl Into<String>) -> Element {
    Element::RuleRef(name.into())
}

/// Picks any table name known to the context.
pub fn table() -> Element {
    Element::Table(TablePick { preferred: Vec::new() })
}

/// Picks a table name, preferring the given names when present in the
/// context catalogue.
pub fn table_from<I>(preferred: I) -> Element
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    Element::Table(TablePick { preferred: preferred.into_iter().map(Into::into).collect() })
}

/// Picks any field name known to the context.
pub fn field() -> Element {
    Element::Field(FieldPick { filter: None })
}

/// Picks a field name matching a type hint (see
/// [`matches_type_category`](crate::types::matches_type_category); the hint
/// `"id"` prefers key columns).
pub fn field_typed(hint: impl Into<String>) -> Element {
    Element::Field(FieldPick { filter: Some(hint.into()) })
}

/// Emits an integer in `lo..=hi` as a decimal string.
pub fn number(lo: i64, hi: i64) -> Result<Element, Error> {
    if lo > hi {
        return Err(Error::InvalidRange { lo, hi });
    }
    Ok(Element::Number(NumberRange { lo, hi }))
}

/// Emits one digit.
pub fn digit() -> Element {
    Element::Digit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;

    fn render(element: &Element, seed: u64) -> String {
        let grammar = Grammar::new("scratch");
        let mut ctx = Context::new(seed);
        element.generate(&grammar, &mut ctx).unwrap()
    }

    #[test]
    fn test_literal_round_trip() {
        assert_eq!(render(&literal("SELECT 1"), 0), "SELECT 1");
    }

    #[test]
    fn test_construction_errors() {
        assert!(matches!(choice(Vec::<Element>::new()), Err(Error::EmptyChoice)));
        assert!(matches!(
            weighted(["a", "b"], &[1]),
            Err(Error::WeightCountMismatch { options: 2, weights: 1 }),
        ));
        assert!(matches!(weighted(["a"], &[0]), Err(Error::ZeroTotalWeight)));
        assert!(matches!(optional(literal("x"), 1.5), Err(Error::InvalidProbability(_))));
        assert!(matches!(repeat(literal("x"), 3, 1, ","), Err(Error::InvalidRange { .. })));
        assert!(matches!(number(10, 1), Err(Error::InvalidRange { .. })));
    }

    #[test]
    fn test_repeat_exact_count() {
        let element = repeat(literal("x"), 3, 3, ",").unwrap();
        assert_eq!(render(&element, 0), "x,x,x");
    }

    #[test]
    fn test_repeat_bounds() {
        let element = repeat(literal("x"), 1, 4, "-").unwrap();
        for seed in 0..200 {
            let output = render(&element, seed);
            let count = output.split('-').count();
            assert!((1..=4).contains(&count), "{output}");
        }
    }

    #[test]
    fn test_repeat_zero_is_empty() {
        let element = repeat(literal("x"), 0, 0, ",").unwrap();
        assert_eq!(render(&element, 9), "");
    }

    #[test]
    fn test_optional_extremes() {
        let never = optional(literal("x"), 0.0).unwrap();
        let always = optional(literal("x"), 1.0).unwrap();
        for seed in 0..100 {
            assert_eq!(render(&never, seed), "");
            assert_eq!(render(&always, seed), "x");
        }
    }

    #[test]
    fn test_optional_distribution() {
        let element = optional(literal("x"), 0.5).unwrap();
        let hits = (0..10_000).filter(|&seed| !render(&element, seed).is_empty()).count();
        assert!((4500..=5500).contains(&hits), "hits = {hits}");
    }

    #[test]
    fn test_uniform_choice_covers_options() {
        let element = choice(["A", "B", "C"]).unwrap();
        let mut counts = [0_u32; 3];
        for seed in 0..3000 {
            match render(&element, seed).as_str() {
                "A" => counts[0] += 1,
                "B" => counts[1] += 1,
                "C" => counts[2] += 1,
                other => panic!("unexpected option {other}"),
            }
        }
        for count in counts {
            assert!((800..=1200).contains(&count), "counts = {counts:?}");
        }
    }

    #[test]
    fn test_weighted_choice_distribution() {
        let element = weighted(["A", "B", "C"], &[1, 1, 2]).unwrap();
        let mut counts = [0_u32; 3];
        for seed in 0..10_000 {
            match render(&element, seed).as_str() {
                "A" => counts[0] += 1,
                "B" => counts[1] += 1,
                "C" => counts[2] += 1,
                other => panic!("unexpected option {other}"),
            }
        }
        assert!((2200..=2800).contains(&counts[0]), "counts = {counts:?}");
        assert!((2200..=2800).contains(&counts[1]), "counts = {counts:?}");
        assert!((4500..=5500).contains(&counts[2]), "counts = {counts:?}");
    }

    #[test]
    fn test_number_and_digit_ranges() {
        let element = number(5, 7).unwrap();
        for seed in 0..100 {
            let value: i64 = render(&element, seed).parse().unwrap();
            assert!((5..=7).contains(&value));
            let digit_value: u32 = render(&digit(), seed).parse().unwrap();
            assert!(digit_value <= 9);
        }
    }

    #[test]
    fn test_template_binding_and_alias() {
        let element = template(
            "INSERT INTO {t} ({c}) VALUES ({v}), ({v2:v})",
            [
                ("t", literal("users")),
                ("c", literal("id")),
                ("v", number(1, 1).unwrap()),
            ],
        );
        assert_eq!(render(&element, 0), "INSERT INTO users (id) VALUES (1), (1)");
    }

    #[test]
    fn test_template_unresolved_survives() {
        let element = template("SELECT {missing} FROM t", Vec::<(&str, Element)>::new());
        assert_eq!(render(&element, 0), "SELECT {missing} FROM t");
    }

    #[test]
    fn test_template_state_lookup() {
        let grammar = Grammar::new("scratch");
        let mut ctx = Context::new(0);
        ctx.set("table", "users");
        let element = template("DELETE FROM {table}", Vec::<(&str, Element)>::new());
        assert_eq!(element.generate(&grammar, &mut ctx).unwrap(), "DELETE FROM users");
    }

    #[test]
    fn test_template_preserves_braces_without_placeholder() {
        let element = template("SELECT '{\"a\": 1}'::jsonb", Vec::<(&str, Element)>::new());
        assert_eq!(render(&element, 0), "SELECT '{\"a\": 1}'::jsonb");
    }

    #[test]
    fn test_lambda_reads_context() {
        let element = lambda(|ctx| format!("seed={}", ctx.seed));
        assert_eq!(render(&element, 42), "seed=42");
    }

    #[test]
    fn test_table_and_field_fallbacks() {
        assert_eq!(render(&table(), 0), "t0");
        assert_eq!(render(&field(), 0), "c0");
    }

    #[test]
    fn test_determinism() {
        let element = weighted(
            [
                template("SELECT {c} FROM {t}", [("c", field()), ("t", table())]),
                repeat(digit(), 2, 5, "").unwrap(),
                optional(literal("COMMIT"), 0.5).unwrap(),
            ],
            &[3, 2, 1],
        )
        .unwrap();
        for seed in 0..50 {
            assert_eq!(render(&element, seed), render(&element, seed));
        }
    }

    #[test]
    fn test_seed_sensitivity() {
        let element = choice(["A", "B"]).unwrap();
        let baseline = render(&element, 0);
        assert!((1..100).any(|seed| render(&element, seed) != baseline));
    }
}
