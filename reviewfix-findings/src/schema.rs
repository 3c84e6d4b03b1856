use reviewfix_types::{Finding, FindingId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unrecognized findings schema (top-level keys: {keys:?})")]
    UnknownSchema { keys: Vec<String> },

    #[error("findings document must be an object or an array, got {found}")]
    NotACollection { found: &'static str },

    #[error("finding #{index}: expected an object, got {found}")]
    NotAnObject { index: usize, found: &'static str },

    #[error("finding #{index}: missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("finding #{index}: field `{field}` {message}")]
    InvalidField {
        index: usize,
        field: &'static str,
        message: String,
    },
}

/// Known input schema variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVariant {
    /// Reviewer service export: `RecommendationSummaries` of PascalCase records.
    Pascal,
    /// camelCase records (`filePath`, `startLine`, ...).
    Camel,
    /// snake_case records (`file_path`, `start_line`, ...).
    Snake,
}

struct FieldNames {
    id: &'static [&'static str],
    file_path: &'static str,
    start_line: &'static str,
    end_line: &'static str,
    description: &'static str,
    suggested_fix: &'static [&'static str],
}

const PASCAL: FieldNames = FieldNames {
    id: &["RecommendationId", "Id"],
    file_path: "FilePath",
    start_line: "StartLine",
    end_line: "EndLine",
    description: "Description",
    suggested_fix: &["SuggestedFix", "SuggestedCode"],
};

const CAMEL: FieldNames = FieldNames {
    id: &["id", "recommendationId"],
    file_path: "filePath",
    start_line: "startLine",
    end_line: "endLine",
    description: "description",
    suggested_fix: &["suggestedFix", "suggestedCode"],
};

const SNAKE: FieldNames = FieldNames {
    id: &["id", "recommendation_id"],
    file_path: "file_path",
    start_line: "start_line",
    end_line: "end_line",
    description: "description",
    suggested_fix: &["suggested_fix", "suggested_code"],
};

/// Container keys, plural and singular, in lookup order.
const CONTAINER_KEYS: &[&str] = &[
    "findings",
    "finding",
    "recommendations",
    "recommendation",
    "RecommendationSummaries",
    "Recommendations",
    "Recommendation",
];

impl SchemaVariant {
    fn fields(self) -> &'static FieldNames {
        match self {
            SchemaVariant::Pascal => &PASCAL,
            SchemaVariant::Camel => &CAMEL,
            SchemaVariant::Snake => &SNAKE,
        }
    }

    /// Pick the variant whose file-path key appears in `record`.
    fn detect(record: &Map<String, Value>) -> Option<Self> {
        [SchemaVariant::Pascal, SchemaVariant::Camel, SchemaVariant::Snake]
            .into_iter()
            .find(|v| record.contains_key(v.fields().file_path))
    }
}

/// Normalize a parsed findings document into canonical findings.
///
/// Accepts a bare array of records, a single record, or an object holding the records under one
/// of the known container keys (the container may hold one record instead of an array). An empty
/// collection is valid and yields no findings.
pub fn normalize(doc: &Value) -> Result<(SchemaVariant, Vec<Finding>), SchemaError> {
    let records = extract_records(doc)?;

    let Some(first) = records.first() else {
        debug!("findings document is empty");
        return Ok((SchemaVariant::Camel, Vec::new()));
    };

    let variant = match first {
        Value::Object(map) => SchemaVariant::detect(map).ok_or_else(|| SchemaError::UnknownSchema {
            keys: map.keys().cloned().collect(),
        })?,
        other => {
            return Err(SchemaError::NotAnObject {
                index: 0,
                found: json_kind(other),
            });
        }
    };

    debug!(?variant, records = records.len(), "normalizing findings");

    let findings = records
        .iter()
        .enumerate()
        .map(|(index, record)| normalize_record(variant, index, record))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((variant, findings))
}

fn extract_records(doc: &Value) -> Result<Vec<&Value>, SchemaError> {
    match doc {
        Value::Array(items) => Ok(items.iter().collect()),
        Value::Object(map) => {
            for key in CONTAINER_KEYS {
                if let Some(inner) = map.get(*key) {
                    return Ok(match inner {
                        Value::Array(items) => items.iter().collect(),
                        Value::Null => Vec::new(),
                        single => vec![single],
                    });
                }
            }
            if SchemaVariant::detect(map).is_some() {
                return Ok(vec![doc]);
            }
            Err(SchemaError::UnknownSchema {
                keys: map.keys().cloned().collect(),
            })
        }
        other => Err(SchemaError::NotACollection {
            found: json_kind(other),
        }),
    }
}

fn normalize_record(
    variant: SchemaVariant,
    index: usize,
    record: &Value,
) -> Result<Finding, SchemaError> {
    let map = record.as_object().ok_or(SchemaError::NotAnObject {
        index,
        found: json_kind(record),
    })?;
    let names = variant.fields();

    let id = match names.id.iter().find_map(|k| map.get(*k)) {
        Some(Value::String(s)) if !s.trim().is_empty() => FindingId::new(s.trim()),
        Some(Value::Number(n)) => FindingId::new(n.to_string()),
        _ => FindingId::from_position(index),
    };

    let file_path = required_str(map, index, names.file_path)?;
    let start_line = required_line(map, index, names.start_line)?;
    let end_line = required_line(map, index, names.end_line)?;
    let description = required_str(map, index, names.description)?;

    let suggested_fix = match names.suggested_fix.iter().find_map(|k| map.get(*k)) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            return Err(SchemaError::InvalidField {
                index,
                field: names.suggested_fix[0],
                message: "must be a string".to_string(),
            });
        }
    };

    Ok(Finding {
        id,
        file_path: file_path.into(),
        start_line,
        end_line,
        description,
        suggested_fix,
    })
}

fn required_str(
    map: &Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<String, SchemaError> {
    match map.get(field) {
        None | Some(Value::Null) => Err(SchemaError::MissingField { index, field }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(SchemaError::InvalidField {
            index,
            field,
            message: "must be a string".to_string(),
        }),
    }
}

fn required_line(
    map: &Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<usize, SchemaError> {
    let invalid = |message: &str| SchemaError::InvalidField {
        index,
        field,
        message: message.to_string(),
    };

    match map.get(field) {
        None | Some(Value::Null) => Err(SchemaError::MissingField { index, field }),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| invalid("must be a non-negative integer")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<usize>()
            .map_err(|_| invalid("must be a non-negative integer")),
        Some(_) => Err(invalid("must be a non-negative integer")),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
