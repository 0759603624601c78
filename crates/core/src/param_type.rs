//! Classification of the catalog's parameter type strings.
//!
//! Recognized forms (case-insensitive unless noted):
//! `str`, `bool`, `int`, `float`, `list of T`, `list[T]`, `X or list of T`,
//! `X or list[T]`, `{a, b}` / `[a, b]` (select, case-sensitive), `any`,
//! `tuple[T1, T2]`. Everything else is `Other`.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    Str,
    Bool,
    Int,
    Float,
    List { element: String },
    Select { options: Vec<String> },
    Any,
    Tuple { slots: Vec<String> },
    Other,
}

impl ParamKind {
    pub fn classify(raw: &str) -> ParamKind {
        let lower = raw.to_ascii_lowercase();
        match lower.as_str() {
            "str" => return ParamKind::Str,
            "bool" => return ParamKind::Bool,
            "int" => return ParamKind::Int,
            "float" => return ParamKind::Float,
            _ => {}
        }

        if let Some(element) = list_element(&lower) {
            // Keep the element's original casing.
            let start = raw.len() - element.len() - usize::from(lower.ends_with(']'));
            let element = raw[start..start + element.len()].to_string();
            return ParamKind::List { element };
        }

        if raw.len() > 2
            && ((raw.starts_with('{') && raw.ends_with('}'))
                || (raw.starts_with('[') && raw.ends_with(']')))
        {
            return ParamKind::Select {
                options: split_items(&raw[1..raw.len() - 1]),
            };
        }

        if lower == "any" {
            return ParamKind::Any;
        }

        if let Some(inner) = lower
            .strip_prefix("tuple[")
            .and_then(|rest| rest.strip_suffix(']'))
            .filter(|inner| !inner.is_empty())
        {
            let start = "tuple[".len();
            return ParamKind::Tuple {
                slots: split_items(&raw[start..start + inner.len()]),
            };
        }

        ParamKind::Other
    }

    /// Value stored for a freshly created node.
    pub fn initial_value(&self, declared_default: &Value) -> Value {
        match self {
            ParamKind::Str
            | ParamKind::Bool
            | ParamKind::Int
            | ParamKind::Float
            | ParamKind::List { .. }
            | ParamKind::Select { .. } => declared_default.clone(),
            ParamKind::Any | ParamKind::Tuple { .. } | ParamKind::Other => Value::Null,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, ParamKind::Any)
    }
}

/// Returns the element type of a list form, using the lowercased input.
fn list_element(lower: &str) -> Option<&str> {
    let tail = match lower.rsplit_once(" or ") {
        Some((head, tail)) if !head.is_empty() => tail,
        Some(_) => return None,
        None => lower,
    };

    tail.strip_prefix("list of ")
        .or_else(|| {
            tail.strip_prefix("list[")
                .and_then(|rest| rest.strip_suffix(']'))
        })
        .filter(|element| !element.is_empty())
}

fn split_items(inner: &str) -> Vec<String> {
    inner
        .split(',')
        .map(|item| item.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
