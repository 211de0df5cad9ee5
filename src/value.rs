//! Type-appropriate SQL literal synthesis.

use crate::types::{is_boolean, is_datetime, is_json, is_numeric, is_string};
use rand::{seq::SliceRandom, Rng, RngCore};

/// Closed vocabulary for text columns.
const TEXT_VALUES: &[&str] = &["'Sample text'", "'Notes'", "'Description'", "'Info'"];

/// Closed vocabulary for varchar columns.
const VARCHAR_VALUES: &[&str] = &[
    "'Test User'",
    "'Product X'",
    "'Active Status'",
    "'user@example.com'",
    "'Category A'",
];

/// Synthesizes an SQL literal appropriate for the given type.
///
/// The mapping is total: unknown types yield `NULL` rather than an error.
/// The number of RNG draws per type is fixed, so value generation keeps the
/// surrounding element tree's random stream stable.
pub fn sql_literal(rng: &mut dyn RngCore, data_type: &str) -> String {
    let dtype = data_type.to_ascii_lowercase();

    if is_boolean(&dtype) {
        return (*["true", "false"].choose(rng).expect("non-empty")).to_owned();
    }

    if is_numeric(&dtype) {
        // narrower integer families first, then the generic int/serial bucket
        if dtype.contains("smallint") {
            return rng.gen_range(1..=100_i64).to_string();
        }
        if dtype.contains("bigint") {
            return rng.gen_range(1..=100_000_i64).to_string();
        }
        if dtype.contains("int") || dtype.contains("serial") {
            return rng.gen_range(1..=1000_i64).to_string();
        }
        if dtype.contains("real") || dtype.contains("float") {
            return format!("{:.2}", rng.gen_range(0.0..1000.0_f64));
        }
        if dtype.contains("double") {
            return format!("{:.4}", rng.gen_range(0.0..1000.0_f64));
        }
        return format!("{}.{:02}", rng.gen_range(1..=10_000_i64), rng.gen_range(0..=99_i64));
    }

    if is_string(&dtype) {
        if dtype.contains("char") && !dtype.contains("var") && !dtype.contains("bpchar") {
            return "'A'".to_owned();
        }
        if dtype.contains("text") {
            return (*TEXT_VALUES.choose(rng).expect("non-empty")).to_owned();
        }
        return (*VARCHAR_VALUES.choose(rng).expect("non-empty")).to_owned();
    }

    if is_datetime(&dtype) {
        if dtype.contains("date") {
            return "CURRENT_DATE".to_owned();
        }
        if dtype.contains("time") && !dtype.contains("stamp") {
            return "CURRENT_TIME".to_owned();
        }
        return "CURRENT_TIMESTAMP".to_owned();
    }

    if is_json(&dtype) {
        return if dtype.contains("jsonb") { "'{}'::jsonb" } else { "'{}'::json" }.to_owned();
    }

    if dtype.contains("array") || dtype.ends_with("[]") {
        return "ARRAY['item1','item2']".to_owned();
    }

    // unknown types never fail
    "NULL".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_hc::Hc128Rng;

    fn gen(data_type: &str) -> String {
        let mut rng = Hc128Rng::seed_from_u64(7);
        sql_literal(&mut rng, data_type)
    }

    #[test]
    fn test_fixed_outputs() {
        struct TestCase {
            data_type: &'static str,
            expected: &'static str,
        }

        let test_cases = vec![
            TestCase { data_type: "date", expected: "CURRENT_DATE" },
            TestCase { data_type: "time", expected: "CURRENT_TIME" },
            TestCase { data_type: "time without time zone", expected: "CURRENT_TIME" },
            TestCase { data_type: "timestamp", expected: "CURRENT_TIMESTAMP" },
            TestCase { data_type: "timestamptz", expected: "CURRENT_TIMESTAMP" },
            TestCase { data_type: "json", expected: "'{}'::json" },
            TestCase { data_type: "jsonb", expected: "'{}'::jsonb" },
            TestCase { data_type: "char(3)", expected: "'A'" },
            TestCase { data_type: "INT[]", expected: "ARRAY['item1','item2']" },
            TestCase { data_type: "no_such_type", expected: "NULL" },
        ];

        for tc in test_cases {
            assert_eq!(gen(tc.data_type), tc.expected, "{}", tc.data_type);
        }
    }

    #[test]
    fn test_integer_families() {
        for _ in 0..50 {
            let mut rng = Hc128Rng::seed_from_u64(rand::random());
            let small: i64 = sql_literal(&mut rng, "smallint").parse().unwrap();
            assert!((1..=100).contains(&small));
            let normal: i64 = sql_literal(&mut rng, "integer").parse().unwrap();
            assert!((1..=1000).contains(&normal));
            let big: i64 = sql_literal(&mut rng, "bigint").parse().unwrap();
            assert!((1..=100_000).contains(&big));
        }
    }

    #[test]
    fn test_decimal_shape() {
        let mut rng = Hc128Rng::seed_from_u64(1);
        for _ in 0..20 {
            let value = sql_literal(&mut rng, "NUMERIC(10,2)");
            let (int_part, frac_part) = value.split_once('.').unwrap();
            assert!(int_part.parse::<i64>().is_ok(), "{}", value);
            assert_eq!(frac_part.len(), 2, "{}", value);
        }
    }

    #[test]
    fn test_float_precision() {
        let mut rng = Hc128Rng::seed_from_u64(2);
        let real = sql_literal(&mut rng, "real");
        assert_eq!(real.split_once('.').unwrap().1.len(), 2);
        let double = sql_literal(&mut rng, "double precision");
        assert_eq!(double.split_once('.').unwrap().1.len(), 4);
    }

    #[test]
    fn test_vocabularies() {
        let mut rng = Hc128Rng::seed_from_u64(3);
        for _ in 0..20 {
            let text = sql_literal(&mut rng, "text");
            assert!(TEXT_VALUES.contains(&text.as_str()));
            let varchar = sql_literal(&mut rng, "varchar(50)");
            assert!(VARCHAR_VALUES.contains(&varchar.as_str()));
            let boolean = sql_literal(&mut rng, "boolean");
            assert!(boolean == "true" || boolean == "false");
        }
    }

    #[test]
    fn test_deterministic_under_seed() {
        for seed in 0..20 {
            assert_eq!(
                {
                    let mut rng = Hc128Rng::seed_from_u64(seed);
                    sql_literal(&mut rng, "integer")
                },
                {
                    let mut rng = Hc128Rng::seed_from_u64(seed);
                    sql_literal(&mut rng, "integer")
                },
            );
        }
    }
}
