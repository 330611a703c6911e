//! PostgreSQL type registry
//!
//! Canonical spellings for the parameterized type families. Each family
//! function receives a type string that already starts with its prefix.

use crate::database::{TypeError, TypeFamily};
use once_cell::sync::Lazy;
use regex::Regex;

/// Types that never take a parameter; they are emitted verbatim.
pub const UNPARAMETERIZED_TYPES: &[&str] = &[
    "bigint",
    "bigserial",
    "boolean",
    "box",
    "bytea",
    "cidr",
    "circle",
    "citext",
    "date",
    "double precision",
    "inet",
    "integer",
    "json",
    "jsonb",
    "line",
    "lseg",
    "macaddr",
    "money",
    "path",
    "pg_lsn",
    "point",
    "polygon",
    "real",
    "smallint",
    "smallserial",
    "serial",
    "text",
    "tsquery",
    "tsvector",
    "txid_snapshot",
    "uuid",
    "xml",
];

pub const TYPE_ALIASES: &[(&str, &str)] = &[
    ("varchar", "character varying"),
    ("varbit", "bit varying"),
    ("char", "character"),
];

/// Order matters: `bit varying` before `bit`, `timestamp` before `time`.
pub const TYPE_FAMILIES: &[TypeFamily] = &[
    TypeFamily { prefix: "bit varying", normalize: bit_varying },
    TypeFamily { prefix: "bit", normalize: bit },
    TypeFamily { prefix: "character varying", normalize: character_varying },
    TypeFamily { prefix: "character", normalize: character },
    TypeFamily { prefix: "timestamp", normalize: timestamp },
    TypeFamily { prefix: "time", normalize: time },
    TypeFamily { prefix: "numeric", normalize: numeric },
];

static BIT_VARYING: Lazy<Regex> = Lazy::new(|| length_pattern("bit varying"));
static BIT: Lazy<Regex> = Lazy::new(|| length_pattern("bit"));
static CHARACTER_VARYING: Lazy<Regex> = Lazy::new(|| length_pattern("character varying"));
static CHARACTER: Lazy<Regex> = Lazy::new(|| length_pattern("character"));
static TIMESTAMP: Lazy<TemporalPatterns> = Lazy::new(|| TemporalPatterns::new("timestamp"));
static TIME: Lazy<TemporalPatterns> = Lazy::new(|| TemporalPatterns::new("time"));

static NUMERIC_PRECISION_AND_SCALE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"numeric\s*\(\s*(?P<precision>\d*),\s*(?P<scale>\d*)\s*\)").expect("valid regex")
});
static NUMERIC_PRECISION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"numeric\s*\(\s*(?P<precision>\d*)\s*\)").expect("valid regex"));

fn length_pattern(family: &str) -> Regex {
    Regex::new(&format!(r"{family}\s*\((?P<max>\d*)\)")).expect("valid regex")
}

fn parse_integer(raw: &str, parameter: &'static str, value: &str) -> Result<u32, TypeError> {
    value.trim().parse().map_err(|_| TypeError::InvalidParameter {
        raw: raw.to_string(),
        parameter,
        value: value.to_string(),
    })
}

/// Families with a mandatory length default to `(1)` when none is given.
fn with_length(raw: &str, family: &str, pattern: &Regex) -> Result<String, TypeError> {
    match pattern.captures(raw) {
        Some(captures) => {
            let max = parse_integer(raw, "length", &captures["max"])?;
            Ok(format!("{family} ({max})"))
        }
        None => Ok(format!("{family} (1)")),
    }
}

fn bit_varying(raw: &str) -> Result<String, TypeError> {
    with_length(raw, "bit varying", &BIT_VARYING)
}

fn bit(raw: &str) -> Result<String, TypeError> {
    with_length(raw, "bit", &BIT)
}

fn character_varying(raw: &str) -> Result<String, TypeError> {
    with_length(raw, "character varying", &CHARACTER_VARYING)
}

fn character(raw: &str) -> Result<String, TypeError> {
    with_length(raw, "character", &CHARACTER)
}

struct TemporalPatterns {
    family: &'static str,
    precision_without_time_zone: Regex,
    precision: Regex,
    without_time_zone: Regex,
}

impl TemporalPatterns {
    fn new(family: &'static str) -> Self {
        let compile = |pattern: String| Regex::new(&pattern).expect("valid regex");
        Self {
            family,
            precision_without_time_zone: compile(format!(
                r"{family}\s*\(\s*(?P<precision>[^)]*)\)\s*without time zone"
            )),
            precision: compile(format!(r"{family}\s*\(\s*(?P<precision>[^)]*)\)")),
            without_time_zone: compile(format!(r"{family}\s*without time zone")),
        }
    }

    /// The most specific combination of precision and qualifier wins.
    fn normalize(&self, raw: &str) -> Result<String, TypeError> {
        let family = self.family;
        if let Some(captures) = self.precision_without_time_zone.captures(raw) {
            let precision = parse_integer(raw, "precision", &captures["precision"])?;
            return Ok(format!("{family} ({precision}) without time zone"));
        }
        if self.without_time_zone.is_match(raw) {
            return Ok(format!("{family} without time zone"));
        }
        if let Some(captures) = self.precision.captures(raw) {
            let precision = parse_integer(raw, "precision", &captures["precision"])?;
            return Ok(format!("{family} ({precision})"));
        }
        Ok(family.to_string())
    }
}

fn timestamp(raw: &str) -> Result<String, TypeError> {
    TIMESTAMP.normalize(raw)
}

fn time(raw: &str) -> Result<String, TypeError> {
    TIME.normalize(raw)
}

/// Bare `numeric` comes back unchanged.
fn numeric(raw: &str) -> Result<String, TypeError> {
    if let Some(captures) = NUMERIC_PRECISION_AND_SCALE.captures(raw) {
        let precision = parse_integer(raw, "precision", &captures["precision"])?;
        let scale = parse_integer(raw, "scale", &captures["scale"])?;
        return Ok(format!("numeric ({precision}, {scale})"));
    }
    if let Some(captures) = NUMERIC_PRECISION.captures(raw) {
        let precision = parse_integer(raw, "precision", &captures["precision"])?;
        return Ok(format!("numeric ({precision})"));
    }
    Ok("numeric".to_string())
}
