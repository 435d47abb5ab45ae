//! Filter-query (`fq`) and sort rendering
//!
//! Values given for one field are OR-ed inside a single clause and clauses for
//! different fields are AND-ed, in the order the fields were first added:
//!
//! ```text
//! tags:(EV OR Population) AND organization:city-of-x
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use std::fmt;
use std::str::FromStr;

use crate::error::{ClientError, Result};

/// Characters that force a value to be quoted
const SPECIAL: &[char] = &[
    ' ', '\t', ':', '(', ')', '[', ']', '{', '}', '"', '\\', '+', '!', '^', '~', '*', '?', '/',
];

/// Ordered set of `field:value` clauses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterQuery {
    clauses: Vec<(String, Vec<String>)>,
    range: Option<DateRange>,
}

/// `field:[start TO end]`, either side open with `*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub field: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Range over any date field, e.g. `metadata_modified`
    pub fn new(
        field: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        let field = field_name("date_range.field", field)?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(ClientError::validation(
                    "date_range",
                    "start is after end",
                ));
            }
        }
        Ok(Self {
            field: field.to_string(),
            start,
            end,
        })
    }

    fn render(&self) -> String {
        let bound = |b: &Option<DateTime<Utc>>| match b {
            Some(t) => t.to_rfc3339_opts(SecondsFormat::Secs, true),
            None => "*".to_string(),
        };
        format!("{}:[{} TO {}]", self.field, bound(&self.start), bound(&self.end))
    }
}

/// A bare index field name such as `res_format` or `extras.theme`
pub fn field_name<'a>(arg: &str, field: &'a str) -> Result<&'a str> {
    let field = field.trim();
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if !valid {
        return Err(ClientError::validation(
            arg,
            format!("`{}` is not a field name", field),
        ));
    }
    Ok(field)
}

/// Read a range bound: RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS` taken as UTC,
/// or a bare date meaning midnight UTC. `field` names the argument in errors.
pub fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
    let s = value.trim();
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|t| t.and_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|t| t.and_utc())
        })
        .ok_or_else(|| {
            ClientError::validation(
                field,
                format!("expected an ISO-8601 date or timestamp, got `{}`", value),
            )
        })
}

impl FilterQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add values that must match `field`; any one of them is enough.
    /// Blank values are ignored and duplicates are kept once.
    pub fn any_of<I, S>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let field = field.trim();
        let values: Vec<String> = values
            .into_iter()
            .map(Into::into)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if field.is_empty() || values.is_empty() {
            return self;
        }

        let index = match self.clauses.iter().position(|(f, _)| f == field) {
            Some(i) => i,
            None => {
                self.clauses.push((field.to_string(), Vec::new()));
                self.clauses.len() - 1
            }
        };
        let slot = &mut self.clauses[index].1;
        for value in values {
            if !slot.contains(&value) {
                slot.push(value);
            }
        }
        self
    }

    pub fn equals(self, field: &str, value: impl Into<String>) -> Self {
        self.any_of(field, [value.into()])
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty() && self.range.is_none()
    }

    /// Render to the catalog's filter syntax, `None` when there is nothing to filter
    pub fn render(&self) -> Option<String> {
        let mut parts: Vec<String> = self
            .clauses
            .iter()
            .map(|(field, values)| match values.as_slice() {
                [single] => format!("{}:{}", field, quote(single)),
                many => format!(
                    "{}:({})",
                    field,
                    many.iter().map(|v| quote(v)).collect::<Vec<_>>().join(" OR ")
                ),
            })
            .collect();
        if let Some(range) = &self.range {
            parts.push(range.render());
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" AND "))
        }
    }
}

fn quote(value: &str) -> String {
    // a leading '-' would negate the term
    if !value.contains(SPECIAL) && !value.starts_with('-') {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => f.write_str("asc"),
            Direction::Desc => f.write_str("desc"),
        }
    }
}

/// `field direction`, e.g. `metadata_modified desc`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.direction)
    }
}

impl FromStr for Sort {
    type Err = ClientError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let field = parts
            .next()
            .ok_or_else(|| ClientError::validation("sort", "must not be empty"))?;
        let direction = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => Direction::Asc,
            Some("desc") => Direction::Desc,
            Some(other) => {
                return Err(ClientError::validation(
                    "sort",
                    format!("direction must be asc or desc, got {}", other),
                ))
            }
        };
        if parts.next().is_some() {
            return Err(ClientError::validation("sort", "expected `field [asc|desc]`"));
        }
        Ok(Sort::new(field, direction))
    }
}
