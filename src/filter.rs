//! Filter and action descriptions.
//!
//! On the wire both are a discriminator (`i:type`) plus a flat set of child
//! fields. [`Descriptor`] is that untyped shape; [`RuleFilter`] and
//! [`RuleAction`] are the typed views, decoded through a discriminator-keyed
//! dispatch table. Anything a typed variant cannot hold losslessly stays
//! `Raw`, so every descriptor survives encode -> decode unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Child element name -> text content.
pub type FieldMap = BTreeMap<String, String>;

const SQL_EXPRESSION: &str = "SqlExpression";
const COMPATIBILITY_LEVEL: &str = "CompatibilityLevel";
const CORRELATION_ID: &str = "CorrelationId";

/// Untyped wire shape of a filter or action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Value of the `type` attribute; `None` when the element has none.
    pub kind: Option<String>,
    pub fields: FieldMap,
}

impl Descriptor {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            fields: FieldMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// A SQL-92 style expression with its optional compatibility level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlExpression {
    pub expression: Option<String>,
    pub compatibility_level: Option<String>,
}

impl SqlExpression {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: Some(expression.into()),
            compatibility_level: None,
        }
    }

    fn from_fields(fields: FieldMap) -> Result<Self, FieldMap> {
        if fields
            .keys()
            .any(|k| k != SQL_EXPRESSION && k != COMPATIBILITY_LEVEL)
        {
            return Err(fields);
        }
        Ok(Self {
            expression: fields.get(SQL_EXPRESSION).cloned(),
            compatibility_level: fields.get(COMPATIBILITY_LEVEL).cloned(),
        })
    }

    fn to_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        if let Some(expr) = &self.expression {
            fields.insert(SQL_EXPRESSION.to_string(), expr.clone());
        }
        if let Some(level) = &self.compatibility_level {
            fields.insert(COMPATIBILITY_LEVEL.to_string(), level.clone());
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationFilter {
    pub correlation_id: String,
}

/// Routing condition of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body")]
pub enum RuleFilter {
    /// `SqlFilter`
    Sql(SqlExpression),
    /// `TrueFilter`
    True(SqlExpression),
    /// `FalseFilter`
    False(SqlExpression),
    /// `CorrelationFilter`
    Correlation(CorrelationFilter),
    /// Any other discriminator, or a known one with fields the typed form can't hold.
    ///
    /// Decode only produces `Raw` for descriptors the typed variants reject. A
    /// `Raw` built by hand around a typed shape (say `SqlFilter` with just a
    /// `SqlExpression`) comes back typed; use [`RuleFilter::normalized`] to
    /// compare such values.
    Raw(Descriptor),
}

type Decoder<T> = fn(FieldMap) -> Result<T, FieldMap>;

const FILTER_KINDS: &[(&str, Decoder<RuleFilter>)] = &[
    ("SqlFilter", sql_filter),
    ("TrueFilter", true_filter),
    ("FalseFilter", false_filter),
    ("CorrelationFilter", correlation_filter),
];

const ACTION_KINDS: &[(&str, Decoder<RuleAction>)] = &[
    ("SqlRuleAction", sql_action),
    ("EmptyRuleAction", empty_action),
];

fn sql_filter(fields: FieldMap) -> Result<RuleFilter, FieldMap> {
    SqlExpression::from_fields(fields).map(RuleFilter::Sql)
}

fn true_filter(fields: FieldMap) -> Result<RuleFilter, FieldMap> {
    SqlExpression::from_fields(fields).map(RuleFilter::True)
}

fn false_filter(fields: FieldMap) -> Result<RuleFilter, FieldMap> {
    SqlExpression::from_fields(fields).map(RuleFilter::False)
}

fn correlation_filter(fields: FieldMap) -> Result<RuleFilter, FieldMap> {
    if fields.len() != 1 {
        return Err(fields);
    }
    match fields.get(CORRELATION_ID).cloned() {
        Some(correlation_id) => Ok(RuleFilter::Correlation(CorrelationFilter { correlation_id })),
        None => Err(fields),
    }
}

fn sql_action(fields: FieldMap) -> Result<RuleAction, FieldMap> {
    SqlExpression::from_fields(fields).map(RuleAction::Sql)
}

fn empty_action(fields: FieldMap) -> Result<RuleAction, FieldMap> {
    if fields.is_empty() {
        Ok(RuleAction::Empty)
    } else {
        Err(fields)
    }
}

fn dispatch<T>(
    table: &[(&str, Decoder<T>)],
    descriptor: Descriptor,
    raw: fn(Descriptor) -> T,
) -> T {
    let Descriptor { kind, fields } = descriptor;
    let decoder = kind
        .as_deref()
        .and_then(|k| table.iter().find(|(name, _)| *name == k))
        .map(|(_, decode)| *decode);
    match decoder {
        Some(decode) => decode(fields).unwrap_or_else(|fields| raw(Descriptor { kind, fields })),
        None => raw(Descriptor { kind, fields }),
    }
}

impl RuleFilter {
    pub fn sql(expression: impl Into<String>) -> Self {
        RuleFilter::Sql(SqlExpression::new(expression))
    }

    /// `TrueFilter` (`1=1`), matches every message.
    pub fn match_all() -> Self {
        RuleFilter::True(SqlExpression::new("1=1"))
    }

    /// `FalseFilter` (`1=0`), matches nothing.
    pub fn match_none() -> Self {
        RuleFilter::False(SqlExpression::new("1=0"))
    }

    pub fn correlation(correlation_id: impl Into<String>) -> Self {
        RuleFilter::Correlation(CorrelationFilter {
            correlation_id: correlation_id.into(),
        })
    }

    pub fn from_descriptor(descriptor: Descriptor) -> Self {
        dispatch(FILTER_KINDS, descriptor, RuleFilter::Raw)
    }

    /// The form decode would produce for this value.
    pub fn normalized(self) -> Self {
        match self {
            RuleFilter::Raw(d) => Self::from_descriptor(d),
            typed => typed,
        }
    }

    pub fn to_descriptor(&self) -> Descriptor {
        let (kind, fields) = match self {
            RuleFilter::Sql(sql) => ("SqlFilter", sql.to_fields()),
            RuleFilter::True(sql) => ("TrueFilter", sql.to_fields()),
            RuleFilter::False(sql) => ("FalseFilter", sql.to_fields()),
            RuleFilter::Correlation(c) => {
                let mut fields = FieldMap::new();
                fields.insert(CORRELATION_ID.to_string(), c.correlation_id.clone());
                ("CorrelationFilter", fields)
            }
            RuleFilter::Raw(d) => return d.clone(),
        };
        Descriptor {
            kind: Some(kind.to_string()),
            fields,
        }
    }
}

/// What a matching rule does to the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body")]
pub enum RuleAction {
    /// `SqlRuleAction`
    Sql(SqlExpression),
    /// `EmptyRuleAction`
    Empty,
    /// Same canonical-form rules as [`RuleFilter::Raw`].
    Raw(Descriptor),
}

impl RuleAction {
    pub fn sql(expression: impl Into<String>) -> Self {
        RuleAction::Sql(SqlExpression::new(expression))
    }

    pub fn from_descriptor(descriptor: Descriptor) -> Self {
        dispatch(ACTION_KINDS, descriptor, RuleAction::Raw)
    }

    /// The form decode would produce for this value.
    pub fn normalized(self) -> Self {
        match self {
            RuleAction::Raw(d) => Self::from_descriptor(d),
            typed => typed,
        }
    }

    pub fn to_descriptor(&self) -> Descriptor {
        match self {
            RuleAction::Sql(sql) => Descriptor {
                kind: Some("SqlRuleAction".to_string()),
                fields: sql.to_fields(),
            },
            RuleAction::Empty => Descriptor::new("EmptyRuleAction"),
            RuleAction::Raw(d) => d.clone(),
        }
    }
}
