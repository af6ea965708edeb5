//! Parsing of loosely-typed search parameters into typed predicates.
//!
//! Numeric filters accept an optional comparator prefix: `>=4.5`, `<=30`,
//! `>300`, `<2`, or a bare value for equality.

use crate::error::RecipeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Cuisine,
    Rating,
    TotalTime,
    Calories,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Title,
        Field::Cuisine,
        Field::Rating,
        Field::TotalTime,
        Field::Calories,
    ];

    #[must_use]
    pub fn param_name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Cuisine => "cuisine",
            Field::Rating => "rating",
            Field::TotalTime => "total_time",
            Field::Calories => "calories",
        }
    }

    #[must_use]
    pub fn from_param(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.param_name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
}

impl Comparator {
    /// Split a raw value into its comparator and the remaining operand.
    /// Two-character prefixes are tried first so `>=5` is never read as `>`
    /// followed by `=5`.
    #[must_use]
    pub fn split(raw: &str) -> (Comparator, &str) {
        const PREFIXES: [(&str, Comparator); 4] = [
            (">=", Comparator::Ge),
            ("<=", Comparator::Le),
            (">", Comparator::Gt),
            ("<", Comparator::Lt),
        ];
        for (prefix, cmp) in PREFIXES {
            if let Some(rest) = raw.strip_prefix(prefix) {
                return (cmp, rest);
            }
        }
        (Comparator::Eq, raw)
    }

    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Comparator::Ge => ">=",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Lt => "<",
            Comparator::Eq => "=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Case-insensitive substring match.
    Contains,
    Exact,
    Compare(Comparator),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Float(f64),
    Int(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: Field,
    pub op: Operator,
    pub value: FilterValue,
}

/// Parse one request parameter.
///
/// Unknown parameter names and empty values yield `Ok(None)`. A value that
/// does not fit the field's numeric type is a `ParseFailure`.
pub fn parse_param(name: &str, raw: &str) -> Result<Option<Predicate>, RecipeError> {
    let Some(field) = Field::from_param(name) else {
        return Ok(None);
    };
    if raw.is_empty() {
        return Ok(None);
    }

    let predicate = match field {
        Field::Title => Predicate {
            field,
            op: Operator::Contains,
            value: FilterValue::Text(raw.to_string()),
        },
        Field::Cuisine => Predicate {
            field,
            op: Operator::Exact,
            value: FilterValue::Text(raw.to_string()),
        },
        Field::Rating => {
            let (cmp, operand) = Comparator::split(raw);
            let value = operand
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| parse_failure(field, raw, "expected a number"))?;
            Predicate {
                field,
                op: Operator::Compare(cmp),
                value: FilterValue::Float(value),
            }
        }
        Field::TotalTime | Field::Calories => {
            let (cmp, operand) = Comparator::split(raw);
            let value = operand
                .trim()
                .parse::<i64>()
                .map_err(|_| parse_failure(field, raw, "expected a whole number"))?;
            Predicate {
                field,
                op: Operator::Compare(cmp),
                value: FilterValue::Int(value),
            }
        }
    };
    Ok(Some(predicate))
}

fn parse_failure(field: Field, raw: &str, reason: &str) -> RecipeError {
    RecipeError::ParseFailure {
        param: field.param_name(),
        value: raw.to_string(),
        reason: reason.to_string(),
    }
}

/// The search parameters a caller may supply. All are optional and combine
/// with AND.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub title: Option<String>,
    pub cuisine: Option<String>,
    pub rating: Option<String>,
    pub total_time: Option<String>,
    pub calories: Option<String>,
}

impl SearchParams {
    /// Build from raw `(name, value)` pairs such as a query string. The first
    /// occurrence of a name wins; unknown names are ignored.
    #[must_use]
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut params = SearchParams::default();
        for (name, value) in pairs {
            let Some(field) = Field::from_param(name) else {
                continue;
            };
            let slot = params.slot(field);
            if slot.is_none() {
                *slot = Some(value.to_string());
            }
        }
        params
    }

    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Title => &mut self.title,
            Field::Cuisine => &mut self.cuisine,
            Field::Rating => &mut self.rating,
            Field::TotalTime => &mut self.total_time,
            Field::Calories => &mut self.calories,
        }
    }

    fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Title => self.title.as_deref(),
            Field::Cuisine => self.cuisine.as_deref(),
            Field::Rating => self.rating.as_deref(),
            Field::TotalTime => self.total_time.as_deref(),
            Field::Calories => self.calories.as_deref(),
        }
    }

    /// Parse every supplied parameter. Values that fail to parse are dropped;
    /// the rest still apply.
    #[must_use]
    pub fn predicates(&self) -> Vec<Predicate> {
        Field::ALL
            .into_iter()
            .filter_map(|field| {
                let raw = self.get(field)?;
                match parse_param(field.param_name(), raw) {
                    Ok(predicate) => predicate,
                    Err(err) => {
                        tracing::debug!(%err, "ignoring search parameter");
                        None
                    }
                }
            })
            .collect()
    }
}
