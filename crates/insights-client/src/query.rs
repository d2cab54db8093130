//! Query body construction.
//!
//! Builds the wire-format request body from a time window, caller
//! filters, and an endpoint class. Building is a pure function of its
//! inputs: the retry loop may serialize and resend the same body and
//! must get identical bytes every time.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

/// Property carrying the query time window.
pub const TIME_PROPERTY: &str = "event_time";

/// Platform type injected for agent-class endpoints when the caller
/// supplied no `platform_type` filter of their own.
pub const DEFAULT_PLATFORM_TYPES: [&str; 1] = ["prisma_access"];

/// Filter operators supported by the Insights query language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    In,
    NotIn,
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanOrEquals,
    LessThanOrEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    LastNHours,
    LastNDays,
    Between,
}

/// A single filter value; the wire format mixes strings and integers
/// (e.g. `last_n_hours` carries a number).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Str(String),
    Int(i64),
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Str(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Str(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::Int(v)
    }
}

impl From<u32> for FilterValue {
    fn from(v: u32) -> Self {
        FilterValue::Int(i64::from(v))
    }
}

/// One predicate in a query filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRule {
    pub property: String,
    pub operator: Operator,
    pub values: Vec<FilterValue>,
}

impl FilterRule {
    /// Create a rule, validating that the value list is non-empty.
    pub fn new(
        property: impl Into<String>,
        operator: Operator,
        values: Vec<FilterValue>,
    ) -> Result<Self> {
        let property = property.into();
        if values.is_empty() {
            return Err(Error::new(ErrorKind::Validation(format!(
                "filter on '{property}' requires at least one value"
            ))));
        }
        Ok(Self {
            property,
            operator,
            values,
        })
    }

    /// Equality filter on a single value.
    pub fn equals(property: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self {
            property: property.into(),
            operator: Operator::Equals,
            values: vec![value.into()],
        }
    }

    /// Membership filter over a list of values.
    pub fn one_of<V: Into<FilterValue>>(
        property: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self> {
        Self::new(
            property,
            Operator::In,
            values.into_iter().map(Into::into).collect(),
        )
    }
}

/// The query time window; always present in a built body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    /// Relative window over the last N hours.
    LastHours(u32),
    /// Relative window over the last N days.
    LastDays(u32),
    /// Explicit start/end window.
    Between(DateTime<Utc>, DateTime<Utc>),
}

impl TimeWindow {
    /// The window as an `event_time` filter rule.
    fn to_rule(self) -> FilterRule {
        match self {
            TimeWindow::LastHours(hours) => FilterRule {
                property: TIME_PROPERTY.to_string(),
                operator: Operator::LastNHours,
                values: vec![FilterValue::Int(i64::from(hours))],
            },
            TimeWindow::LastDays(days) => FilterRule {
                property: TIME_PROPERTY.to_string(),
                operator: Operator::LastNDays,
                values: vec![FilterValue::Int(i64::from(days))],
            },
            TimeWindow::Between(start, end) => FilterRule {
                property: TIME_PROPERTY.to_string(),
                operator: Operator::Between,
                values: vec![
                    FilterValue::Str(start.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    FilterValue::Str(end.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ],
            },
        }
    }

    /// Approximate span in hours, used to pick histogram granularity.
    fn span_hours(&self) -> u64 {
        match self {
            TimeWindow::LastHours(hours) => u64::from(*hours),
            TimeWindow::LastDays(days) => u64::from(*days) * 24,
            TimeWindow::Between(start, end) => {
                let span = end.signed_duration_since(*start);
                span.num_hours().max(0) as u64
            }
        }
    }

    /// Validate that an explicit window is ordered.
    fn validate(&self) -> Result<()> {
        match self {
            TimeWindow::LastHours(0) | TimeWindow::LastDays(0) => Err(Error::new(
                ErrorKind::Validation("time window must cover at least one interval".to_string()),
            )),
            TimeWindow::Between(start, end) if start >= end => Err(Error::new(
                ErrorKind::Validation("time window start must precede end".to_string()),
            )),
            _ => Ok(()),
        }
    }
}

/// Category of remote query sharing the same mandatory-filter and
/// body-shape rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointClass {
    /// No extra body rules.
    Generic,
    /// Agent-type user endpoints; the API rejects bodies without a
    /// `platform_type` membership filter, so one is injected when the
    /// caller supplied none.
    AgentUser,
    /// Session endpoints scoped to a connection type; require a
    /// caller-supplied `username` filter.
    UserSession,
    /// Time-series endpoints; require a histogram block derived from
    /// the window.
    Histogram,
}

/// Time-bucket granularity for histogram queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Minute,
    Hour,
    Day,
}

/// Histogram block for time-series-shaped results.
///
/// `value` is the interval width in units of `range`; empty intervals
/// are always requested so a series has a point for every bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramConfig {
    #[serde(rename = "enableEmptyInterval")]
    pub enable_empty_interval: bool,
    pub property: String,
    pub range: Bucket,
    pub value: u32,
}

impl HistogramConfig {
    fn for_window(window: &TimeWindow) -> Self {
        let (range, value) = match window.span_hours() {
            0..=6 => (Bucket::Minute, 5),
            7..=72 => (Bucket::Hour, 1),
            _ => (Bucket::Day, 1),
        };
        Self {
            enable_empty_interval: true,
            property: TIME_PROPERTY.to_string(),
            range,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct QueryFilter {
    rules: Vec<FilterRule>,
}

/// Wire-format request body for a query endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    filter: QueryFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    histogram: Option<HistogramConfig>,
    /// Pagination hint: maximum records in the returned page.
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<String>,
}

impl QueryRequest {
    /// Limit the returned page to at most `count` records.
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// Attach a search term (site-location search endpoints).
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// The filter rules in body order.
    pub fn rules(&self) -> &[FilterRule] {
        &self.filter.rules
    }

    /// The histogram block, when present.
    pub fn histogram(&self) -> Option<&HistogramConfig> {
        self.histogram.as_ref()
    }
}

/// Build a query body for the given endpoint class.
///
/// Fails with a validation error, before any network call, when the
/// endpoint class mandates a filter the caller omitted. Pure: equal
/// inputs always produce an equal (byte-identical when serialized)
/// body.
pub fn build_query(
    window: TimeWindow,
    filters: &[FilterRule],
    class: EndpointClass,
) -> Result<QueryRequest> {
    window.validate()?;

    let mut rules = Vec::with_capacity(filters.len() + 2);
    rules.push(window.to_rule());
    rules.extend(filters.iter().cloned());

    let mut histogram = None;

    match class {
        EndpointClass::Generic => {}
        EndpointClass::AgentUser => {
            if !filters.iter().any(|f| f.property == "platform_type") {
                rules.push(FilterRule {
                    property: "platform_type".to_string(),
                    operator: Operator::In,
                    values: DEFAULT_PLATFORM_TYPES
                        .iter()
                        .map(|p| FilterValue::Str((*p).to_string()))
                        .collect(),
                });
            }
        }
        EndpointClass::UserSession => {
            let has_username = filters.iter().any(|f| {
                f.property == "username"
                    && matches!(f.operator, Operator::Equals | Operator::In)
            });
            if !has_username {
                return Err(Error::new(ErrorKind::Validation(
                    "session queries require a username filter".to_string(),
                )));
            }
        }
        EndpointClass::Histogram => {
            histogram = Some(HistogramConfig::for_window(&window));
        }
    }

    Ok(QueryRequest {
        filter: QueryFilter { rules },
        histogram,
        count: None,
        search: None,
    })
}
