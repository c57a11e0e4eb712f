use crate::{
    error::{ConfigurationError, ConversionError, Error, PathError},
    value::Value,
};
use regex::{Regex, RegexBuilder};
use std::{cmp::Ordering, fmt};

const BOOL_MESSAGE: &str = "Value must be a boolean or a true/false/yes/no string value";

//
// ============================================================================
// Conversion
// ============================================================================
//

pub(crate) fn convert_bool(raw: &Value) -> Result<Value, Error> {
    match raw {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Text(s) => match s.as_str() {
            "true" | "True" | "yes" | "Yes" => Ok(Value::Bool(true)),
            "false" | "False" | "no" | "No" => Ok(Value::Bool(false)),
            _ => Err(ConversionError::here(BOOL_MESSAGE).into()),
        },
        _ => Err(ConversionError::here(BOOL_MESSAGE).into()),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub(crate) fn convert_int(raw: &Value) -> Result<Value, Error> {
    let not_integer = || ConversionError::here(format!("Value {} is not an integer number", raw.repr()));

    match raw {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) if f.is_finite() && f.fract() != 0.0 => Err(ConversionError::here(
            format!("Numeric value {f} is not an integer"),
        )
        .into()),
        Value::Float(f) if f.is_finite() && (i64::MIN as f64..=i64::MAX as f64).contains(f) => {
            Ok(Value::Int(*f as i64))
        }
        Value::Text(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| not_integer().into()),
        _ => Err(not_integer().into()),
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn convert_float(raw: &Value) -> Result<Value, Error> {
    match raw {
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Bool(b) => Ok(Value::Float(f64::from(u8::from(*b)))),
        Value::Text(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            ConversionError::here(format!("Value {} is not a float number", raw.repr())).into()
        }),
        _ => Err(
            ConversionError::here(format!("Value {} is not a float number", raw.repr())).into(),
        ),
    }
}

/// Bools become lowercase `true`/`false`; whole floats keep a `.0`.
pub(crate) fn convert_str(raw: &Value) -> Result<Value, Error> {
    match raw {
        Value::Text(s) => Ok(Value::Text(s.clone())),
        Value::Bool(b) => Ok(Value::Text(b.to_string())),
        Value::Int(i) => Ok(Value::Text(i.to_string())),
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 => Ok(Value::Text(format!("{f:.1}"))),
        Value::Float(f) => Ok(Value::Text(f.to_string())),
        other => Err(ConversionError::here(format!(
            "Value must be a string, got a {}",
            other.kind_name()
        ))
        .into()),
    }
}

//
// ============================================================================
// NumberRule
// ============================================================================
//

///
/// Bound
///
/// One numeric bound. Integer bounds compare exactly against integer
/// values; float bounds render with a fractional part in messages.
///

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bound {
    Int(i64),
    Float(f64),
}

impl Bound {
    // ordering of `value` relative to this bound, None for NaN
    fn order_of(self, value: &Value) -> Option<Ordering> {
        match (value, self) {
            (Value::Int(i), Self::Int(b)) => Some(i.cmp(&b)),
            (Value::Int(i), Self::Float(b)) => cmp_int_float(*i, b),
            (Value::Float(f), Self::Int(b)) => cmp_int_float(b, *f).map(Ordering::reverse),
            (Value::Float(f), Self::Float(b)) => f.partial_cmp(&b),
            _ => None,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
        }
    }
}

impl From<i64> for Bound {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Bound {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u32> for Bound {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Bound {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

/// Exact ordering of an integer against a float.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn cmp_int_float(i: i64, f: f64) -> Option<Ordering> {
    // 2^63, exactly representable
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;

    if f.is_nan() {
        return None;
    }
    if f >= LIMIT {
        return Some(Ordering::Less);
    }
    if f < -LIMIT {
        return Some(Ordering::Greater);
    }

    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(f - whole)),
        other => Some(other),
    }
}

///
/// NumberRule
/// Inclusive numeric bounds shared by int and float descriptors.
///

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NumberRule {
    pub min: Option<Bound>,
    pub max: Option<Bound>,
}

impl NumberRule {
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub(crate) fn validate(&self, value: &Value, out: &mut Vec<PathError>) {
        if !matches!(value, Value::Int(_) | Value::Float(_)) {
            return;
        }
        let below = |b: Bound| b.order_of(value) == Some(Ordering::Less);
        let above = |b: Bound| b.order_of(value) == Some(Ordering::Greater);
        let within = |min: Bound, max: Bound| {
            matches!(min.order_of(value), Some(Ordering::Greater | Ordering::Equal))
                && matches!(max.order_of(value), Some(Ordering::Less | Ordering::Equal))
        };

        match (self.min, self.max) {
            (Some(min), Some(max)) if !within(min, max) => {
                out.push(PathError::here(format!("Must be between {min} and {max}")));
            }
            (Some(min), None) if below(min) => {
                out.push(PathError::here(format!("Must be at least {min}")));
            }
            (None, Some(max)) if above(max) => {
                out.push(PathError::here(format!("Must be at most {max}")));
            }
            _ => {}
        }
    }
}

//
// ============================================================================
// StrRule
// ============================================================================
//

///
/// StrRule
///
/// Native string rule. Length, choices and pattern are mutually exclusive;
/// lengths count characters, not bytes.
///

#[derive(Clone, Debug, Default)]
pub enum StrRule {
    #[default]
    None,
    Length {
        min: usize,
        max: Option<usize>,
    },
    Choices(Vec<String>),
    Pattern {
        regex: Regex,
        source: String,
        case_insensitive: bool,
    },
}

impl StrRule {
    /// Build a rule from the raw options, rejecting combinations.
    pub fn build(
        min_length: usize,
        max_length: Option<usize>,
        choices: Option<Vec<String>>,
        pattern: Option<(String, bool)>,
    ) -> Result<Self, ConfigurationError> {
        let has_length = min_length > 0 || max_length.is_some();
        let exclusive = [has_length, choices.is_some(), pattern.is_some()]
            .into_iter()
            .filter(|set| *set)
            .count();
        if exclusive > 1 {
            return Err(ConfigurationError::new(
                "Can only validate length, choices or regex; not combinations of these",
            ));
        }

        if let Some(mut choices) = choices {
            // keep first occurrence order
            let mut seen = std::collections::BTreeSet::new();
            choices.retain(|choice| seen.insert(choice.clone()));
            return Ok(Self::Choices(choices));
        }

        if let Some((source, case_insensitive)) = pattern {
            // anchored at the start only, like a prefix match
            let regex = RegexBuilder::new(&format!("^(?:{source})"))
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|err| ConfigurationError::new(format!("Invalid regex `{source}`: {err}")))?;

            return Ok(Self::Pattern {
                regex,
                source,
                case_insensitive,
            });
        }

        if has_length {
            return Ok(Self::Length {
                min: min_length,
                max: max_length,
            });
        }

        Ok(Self::None)
    }

    pub(crate) fn validate(&self, value: &Value, out: &mut Vec<PathError>) {
        let Value::Text(text) = value else {
            return;
        };

        if let Some(message) = self.check(text) {
            out.push(PathError::here(message));
        }
    }

    fn check(&self, text: &str) -> Option<String> {
        match self {
            Self::None => None,
            Self::Choices(choices) => (!choices.iter().any(|c| c == text))
                .then(|| format!("Must be one of: {}", choices.join(", "))),
            Self::Pattern {
                regex,
                source,
                case_insensitive,
            } => (!regex.is_match(text)).then(|| {
                let case = if *case_insensitive {
                    " (case insensitive)"
                } else {
                    ""
                };
                format!("Must match regex `{source}`{case}")
            }),
            Self::Length { min, max } => check_length(*min, *max, text.chars().count()),
        }
    }
}

fn check_length(min: usize, max: Option<usize>, len: usize) -> Option<String> {
    let plural = |n: usize| if n > 1 { "s" } else { "" };

    match max {
        Some(max) if min > 0 => {
            if (min..=max).contains(&len) {
                None
            } else if min == max {
                Some(format!("Must be exactly {min} character{} long", plural(min)))
            } else {
                Some(format!("Must be {min} to {max} characters long"))
            }
        }
        Some(max) => {
            (len > max).then(|| format!("Must be at most {max} character{} long", plural(max)))
        }
        None if min == 1 => (len == 0).then(|| "This value cannot be empty".to_string()),
        None => (len < min).then(|| format!("Must be at least {min} characters long")),
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn messages(rule: &StrRule, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        rule.validate(&Value::from(text), &mut out);
        out.into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn bool_accepts_case_variants() {
        for (raw, expected) in [("yes", true), ("Yes", true), ("True", true), ("no", false), ("False", false)] {
            assert_eq!(convert_bool(&Value::from(raw)).unwrap(), Value::Bool(expected));
        }
    }

    #[test]
    fn bool_rejects_other_strings_and_numbers() {
        for raw in [Value::from("bad"), Value::from("YES"), Value::Int(1)] {
            assert_eq!(convert_bool(&raw).unwrap_err().to_string(), BOOL_MESSAGE);
        }
    }

    #[test]
    fn int_rejects_fractional_float() {
        let err = convert_int(&Value::Float(4.2)).unwrap_err();

        assert_eq!(err.to_string(), "Numeric value 4.2 is not an integer");
    }

    #[test]
    fn int_accepts_whole_float_and_numeric_string() {
        assert_eq!(convert_int(&Value::Float(4.0)).unwrap(), Value::Int(4));
        assert_eq!(convert_int(&Value::from(" 12 ")).unwrap(), Value::Int(12));
    }

    #[test]
    fn float_accepts_int_and_string() {
        assert_eq!(convert_float(&Value::Int(2)).unwrap(), Value::Float(2.0));
        assert_eq!(convert_float(&Value::from("2.5")).unwrap(), Value::Float(2.5));
        assert_eq!(
            convert_float(&Value::from("x")).unwrap_err().to_string(),
            "Value 'x' is not a float number"
        );
    }

    #[test]
    fn str_rejects_containers() {
        let err = convert_str(&Value::List(vec![])).unwrap_err();

        assert_eq!(err.to_string(), "Value must be a string, got a list");
        assert_eq!(convert_str(&Value::Float(3.0)).unwrap(), Value::from("3.0"));
        assert_eq!(convert_str(&Value::Bool(true)).unwrap(), Value::from("true"));
    }

    fn bound_messages(rule: NumberRule, value: Value) -> Vec<String> {
        let mut out = Vec::new();
        rule.validate(&value, &mut out);
        out.into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn number_bounds_messages() {
        let both = NumberRule { min: Some(Bound::Int(1)), max: Some(Bound::Int(5)) };
        assert_eq!(bound_messages(both, Value::Int(6)), vec!["Must be between 1 and 5"]);
        assert!(bound_messages(both, Value::Int(5)).is_empty());

        let min = NumberRule { min: Some(Bound::Int(2)), max: None };
        assert_eq!(bound_messages(min, Value::Int(1)), vec!["Must be at least 2"]);

        let max = NumberRule { min: None, max: Some(Bound::Float(2.5)) };
        assert_eq!(bound_messages(max, Value::Int(3)), vec!["Must be at most 2.5"]);
    }

    #[test]
    fn float_bounds_keep_fraction_in_messages() {
        let rule = NumberRule { min: Some(Bound::Float(1.0)), max: None };
        assert_eq!(bound_messages(rule, Value::Float(0.5)), vec!["Must be at least 1.0"]);

        let both = NumberRule { min: Some(Bound::Float(0.0)), max: Some(Bound::Float(1.0)) };
        assert_eq!(bound_messages(both, Value::Float(1.5)), vec!["Must be between 0.0 and 1.0"]);
    }

    #[test]
    fn int_bounds_compare_exactly_above_float_precision() {
        let limit: i64 = 1 << 53;

        let exact = NumberRule { min: None, max: Some(Bound::Int(limit)) };
        assert_eq!(
            bound_messages(exact, Value::Int(limit + 1)),
            vec!["Must be at most 9007199254740992"]
        );
        assert!(bound_messages(exact, Value::Int(limit)).is_empty());

        #[allow(clippy::cast_precision_loss)]
        let float = NumberRule { min: None, max: Some(Bound::Float(limit as f64)) };
        assert_eq!(
            bound_messages(float, Value::Int(limit + 1)),
            vec!["Must be at most 9007199254740992.0"]
        );

        let floor = NumberRule { min: Some(Bound::Int(i64::MAX)), max: None };
        assert_eq!(
            bound_messages(floor, Value::Int(i64::MAX - 1)),
            vec!["Must be at least 9223372036854775807"]
        );
    }

    #[test]
    fn mixed_bounds_respect_fractions() {
        assert_eq!(cmp_int_float(2, 2.5), Some(Ordering::Less));
        assert_eq!(cmp_int_float(-2, -2.5), Some(Ordering::Greater));
        assert_eq!(cmp_int_float(3, 3.0), Some(Ordering::Equal));
        assert_eq!(cmp_int_float(i64::MAX, 9.3e18), Some(Ordering::Less));
        assert_eq!(cmp_int_float(0, f64::NAN), None);

        let rule = NumberRule { min: None, max: Some(Bound::Int(2)) };
        assert_eq!(bound_messages(rule, Value::Float(2.1)), vec!["Must be at most 2"]);
        assert!(bound_messages(rule, Value::Float(2.0)).is_empty());
    }

    #[test]
    fn length_messages() {
        let rule = |min, max| StrRule::build(min, max, None, None).unwrap();

        assert_eq!(messages(&rule(1, None), ""), vec!["This value cannot be empty"]);
        assert_eq!(messages(&rule(2, None), "a"), vec!["Must be at least 2 characters long"]);
        assert_eq!(messages(&rule(0, Some(1)), "ab"), vec!["Must be at most 1 character long"]);
        assert_eq!(messages(&rule(3, Some(3)), "ab"), vec!["Must be exactly 3 characters long"]);
        assert_eq!(messages(&rule(2, Some(4)), "a"), vec!["Must be 2 to 4 characters long"]);
        assert!(messages(&rule(2, Some(4)), "ééé").is_empty());
    }

    #[test]
    fn choices_keep_declaration_order() {
        let rule = StrRule::build(0, None, Some(vec!["b".into(), "a".into(), "b".into()]), None).unwrap();

        assert_eq!(messages(&rule, "c"), vec!["Must be one of: b, a"]);
        assert!(messages(&rule, "a").is_empty());
    }

    #[test]
    fn pattern_matches_prefix() {
        let rule = StrRule::build(0, None, None, Some(("[a-z]+".into(), false))).unwrap();
        assert!(messages(&rule, "abc123").is_empty());
        assert_eq!(messages(&rule, "1abc"), vec!["Must match regex `[a-z]+`"]);

        let ci = StrRule::build(0, None, None, Some(("abc".into(), true))).unwrap();
        assert!(messages(&ci, "ABC").is_empty());
        assert_eq!(messages(&ci, "x"), vec!["Must match regex `abc` (case insensitive)"]);
    }

    #[test]
    fn exclusive_options_are_rejected() {
        let err = StrRule::build(1, None, Some(vec!["a".into()]), None).unwrap_err();

        assert_eq!(
            err.message,
            "Can only validate length, choices or regex; not combinations of these"
        );
    }

    proptest! {
        #[test]
        fn int_round_trips_through_text(n in any::<i64>()) {
            prop_assert_eq!(convert_int(&Value::Text(n.to_string())).unwrap(), Value::Int(n));
        }

        #[test]
        fn whole_floats_convert_to_int(n in -1_000_000i64..1_000_000) {
            #[allow(clippy::cast_precision_loss)]
            let f = n as f64;
            prop_assert_eq!(convert_int(&Value::Float(f)).unwrap(), Value::Int(n));
        }
    }
}
