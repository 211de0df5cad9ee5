//! SQL type classification.
//!
//! Maps free-form SQL type strings (`"VARCHAR(50)"`, `"NUMERIC(10,2)"`,
//! `"bigint"`) onto a closed set of semantic categories, so grammars and the
//! value generator can ask questions like "is this column numeric" without
//! caring about parameterization or dialect spelling.

/// Numeric base types.
pub const NUMERIC_TYPES: &[&str] = &[
    "integer",
    "int",
    "smallint",
    "bigint",
    "serial",
    "bigserial",
    "decimal",
    "numeric",
    "real",
    "double precision",
    "float",
    "money",
];

/// String base types.
pub const STRING_TYPES: &[&str] = &[
    "character varying",
    "varchar",
    "character",
    "char",
    "text",
    "name",
    "bpchar",
];

/// Date/time base types.
pub const DATETIME_TYPES: &[&str] = &[
    "timestamp",
    "timestamp without time zone",
    "timestamptz",
    "timestamp with time zone",
    "date",
    "time",
    "time without time zone",
    "timetz",
    "time with time zone",
    "interval",
];

/// Boolean base types.
pub const BOOLEAN_TYPES: &[&str] = &["boolean", "bool"];

/// JSON base types.
pub const JSON_TYPES: &[&str] = &["json", "jsonb"];

/// Network address base types.
pub const NET_TYPES: &[&str] = &["inet", "cidr", "macaddr", "macaddr8"];

/// Geometric base types.
pub const GEO_TYPES: &[&str] = &["point", "line", "lseg", "box", "path", "polygon", "circle"];

/// Strips parameterization and normalizes case, so `"NUMERIC(10,2)"`
/// becomes `"numeric"`.
pub fn base_type(data_type: &str) -> String {
    let base = data_type.split('(').next().unwrap_or(data_type);
    base.trim().to_ascii_lowercase()
}

/// Checks whether a data type is numeric. Handles parameterized spellings
/// like `NUMERIC(10,2)`.
pub fn is_numeric(data_type: &str) -> bool {
    NUMERIC_TYPES.contains(&base_type(data_type).as_str())
}

/// Checks whether a data type is a string type.
pub fn is_string(data_type: &str) -> bool {
    STRING_TYPES.contains(&base_type(data_type).as_str())
}

/// Checks whether a data type is a date/time type.
pub fn is_datetime(data_type: &str) -> bool {
    let base = base_type(data_type);
    DATETIME_TYPES.contains(&base.as_str())
        || base.contains("timestamp")
        || base.contains("date")
        || base.contains("time")
}

/// Checks whether a data type is boolean.
pub fn is_boolean(data_type: &str) -> bool {
    BOOLEAN_TYPES.contains(&base_type(data_type).as_str())
}

/// Checks whether a data type is JSON.
pub fn is_json(data_type: &str) -> bool {
    JSON_TYPES.contains(&base_type(data_type).as_str())
}

/// Checks whether a data type is a network address type.
pub fn is_net(data_type: &str) -> bool {
    NET_TYPES.contains(&base_type(data_type).as_str())
}

/// Checks whether a data type is a geometric type.
pub fn is_geo(data_type: &str) -> bool {
    GEO_TYPES.contains(&base_type(data_type).as_str())
}

/// Named type categories usable as matching targets.
///
/// Categories overlap deliberately: `bigint` is in both `Numeric` and `Int`,
/// so it matches either target.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TypeCategory {
    /// All numeric types, including the internal `float4`/`float8` aliases.
    Numeric,
    /// Integer types only.
    Int,
    /// Textual types.
    Text,
    /// Boolean types.
    Boolean,
    /// Date/time types.
    Temporal,
    /// JSON types.
    Json,
    /// Network address types.
    Net,
    /// Geometric types.
    Geo,
    /// Range types.
    Range,
    /// Bit-string types.
    Bit,
    /// The money type.
    Money,
    /// The bytea type.
    Bytea,
}

impl TypeCategory {
    /// All categories, in matching order.
    pub const ALL: &'static [TypeCategory] = &[
        TypeCategory::Numeric,
        TypeCategory::Int,
        TypeCategory::Text,
        TypeCategory::Boolean,
        TypeCategory::Temporal,
        TypeCategory::Json,
        TypeCategory::Net,
        TypeCategory::Geo,
        TypeCategory::Range,
        TypeCategory::Bit,
        TypeCategory::Money,
        TypeCategory::Bytea,
    ];

    /// Resolves a category from its lower-case name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "numeric" => TypeCategory::Numeric,
            "int" => TypeCategory::Int,
            "text" => TypeCategory::Text,
            "boolean" => TypeCategory::Boolean,
            "temporal" => TypeCategory::Temporal,
            "json" => TypeCategory::Json,
            "net" => TypeCategory::Net,
            "geo" => TypeCategory::Geo,
            "range" => TypeCategory::Range,
            "bit" => TypeCategory::Bit,
            "money" => TypeCategory::Money,
            "bytea" => TypeCategory::Bytea,
            _ => return None,
        })
    }

    /// The base type names belonging to this category.
    pub fn members(self) -> &'static [&'static str] {
        match self {
            TypeCategory::Numeric => &[
                "integer",
                "int",
                "smallint",
                "bigint",
                "serial",
                "bigserial",
                "decimal",
                "numeric",
                "real",
                "double precision",
                "float",
                "money",
                "float4",
                "float8",
            ],
            TypeCategory::Int => &[
                "integer",
                "int",
                "smallint",
                "bigint",
                "serial",
                "bigserial",
                "tinyint",
                "int4",
                "int8",
            ],
            TypeCategory::Text => &[
                "character varying",
                "varchar",
                "character",
                "char",
                "text",
                "name",
                "bpchar",
                "string",
            ],
            TypeCategory::Boolean => BOOLEAN_TYPES,
            TypeCategory::Temporal => DATETIME_TYPES,
            TypeCategory::Json => JSON_TYPES,
            TypeCategory::Net => NET_TYPES,
            TypeCategory::Geo => GEO_TYPES,
            TypeCategory::Range => &["int4range", "int8range", "numrange", "tsrange", "daterange"],
            TypeCategory::Bit => &["bit", "bit varying", "varbit"],
            TypeCategory::Money => &["money"],
            TypeCategory::Bytea => &["bytea"],
        }
    }

    /// Whether the given base type name is a member of this category.
    pub fn contains(self, base: &str) -> bool {
        self.members().contains(&base)
    }
}

/// Checks whether a column type matches a target type or type category.
///
/// Resolution order:
/// 1. direct base-type match,
/// 2. the target names a category and the column's base type is in it,
/// 3. the target is itself a member of some category which also contains
///    the column's base type,
/// 4. a coarse fallback via the `is_*` helpers.
///
/// These rules make `"VARCHAR(50)"` match `"text"` and `"bigint"` match
/// `"numeric"`. Unknown combinations yield `false`, never an error.
pub fn matches_type_category(col_type: &str, target_type: &str) -> bool {
    let col = base_type(col_type);
    let target = target_type.trim().to_ascii_lowercase();

    if col == target {
        return true;
    }

    if let Some(category) = TypeCategory::from_name(&target) {
        return category.contains(&col);
    }

    for category in TypeCategory::ALL {
        if category.contains(&target) {
            return category.contains(&col);
        }
    }

    match target.as_str() {
        "int" | "integer" | "bigint" | "smallint" | "numeric" | "real" | "float" | "decimal" => {
            is_numeric(col_type)
        }
        "text" | "varchar" | "char" | "character" | "string" => is_string(col_type),
        "boolean" | "bool" => is_boolean(col_type),
        "date" | "timestamp" | "timestamptz" | "time" | "timetz" | "interval" => {
            is_datetime(col_type)
        }
        "json" | "jsonb" => is_json(col_type),
        _ => false,
    }
}
