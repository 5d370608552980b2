//! Normalization of order and training submissions before they are forwarded.
//!
//! Inbound bodies are arbitrary JSON. Free text is trimmed, numbers are
//! coerced from numeric strings, and malformed line items are dropped. Required
//! fields that are missing are collected and reported together as one
//! validation error.

use crate::types::{AppError, Result};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Canonical training field and the inbound keys accepted for it, in priority order.
const TRAINING_ALIASES: &[(&str, &[&str])] = &[
    ("nome", &["nome", "name"]),
    ("email", &["email"]),
    ("formacao", &["formacao", "training"]),
    ("telefone", &["telefone", "phone"]),
    ("mensagem", &["mensagem", "message"]),
];

/// A normalized order line.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub name: String,
    #[serde(serialize_with = "compact_number")]
    pub qty: f64,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "compact_option")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "compact_option")]
    pub line_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A normalized order submission.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart_summary: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "compact_option")]
    pub total: Option<f64>,
}

/// A normalized training registration, in the upstream's field names.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TrainingPayload {
    pub nome: String,
    pub email: String,
    pub formacao: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mensagem: Option<String>,
}

// Whole numbers go out as integers, so `1.0` is sent as `1`.
fn compact_number<S: Serializer>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

fn compact_option<S: Serializer>(
    value: &Option<f64>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(v) => compact_number(v, serializer),
        None => serializer.serialize_none(),
    }
}

fn text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Finite number from a JSON number or a numeric string.
fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Reads an optional non-negative amount. `Ok(None)` when absent, `Err(())` when present but unusable.
fn amount(fields: &Map<String, Value>, key: &str) -> std::result::Result<Option<f64>, ()> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => match number(raw) {
            Some(n) if n >= 0.0 => Ok(Some(n)),
            _ => Err(()),
        },
    }
}

fn item_id(value: Option<&Value>) -> Option<Value> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| Value::String(s.to_string()))
        }
        Value::Number(n) => Some(Value::Number(n.clone())),
        _ => None,
    }
}

fn normalise_item(raw: &Value) -> Option<OrderItem> {
    let fields = raw.as_object()?;

    let name = text(fields, "name")?;
    let qty = fields.get("qty").and_then(number).filter(|q| *q > 0.0)?;
    let price = amount(fields, "price").ok()?;
    let line_total = match amount(fields, "lineTotal").ok()? {
        Some(total) => Some(total),
        None => price.map(|p| p * qty),
    };

    Some(OrderItem {
        id: item_id(fields.get("id")),
        name,
        qty,
        price,
        line_total,
        image: text(fields, "image"),
    })
}

/// Validates and normalizes an order submission.
///
/// `name` and `email` are required. Malformed items are dropped, but a
/// non-empty `items` array that yields no valid item is rejected.
pub fn sanitize_order(body: &Value) -> Result<OrderPayload> {
    let empty = Map::new();
    let fields = body.as_object().unwrap_or(&empty);
    let mut errors = Vec::new();

    let name = text(fields, "name");
    if name.is_none() {
        errors.push("Name is required.");
    }
    let email = text(fields, "email");
    if email.is_none() {
        errors.push("Email is required.");
    }

    let raw_items = fields
        .get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let items: Vec<OrderItem> = raw_items.iter().filter_map(normalise_item).collect();
    if !raw_items.is_empty() && items.is_empty() {
        errors.push("Order must contain at least one valid item.");
    }
    if items.len() < raw_items.len() {
        tracing::debug!(
            dropped = raw_items.len() - items.len(),
            "dropped malformed order items"
        );
    }

    let total = fields.get("total").and_then(number).filter(|t| *t >= 0.0);

    match (name, email) {
        (Some(name), Some(email)) if errors.is_empty() => Ok(OrderPayload {
            name,
            email,
            business: text(fields, "business"),
            services: text(fields, "services"),
            message: text(fields, "message"),
            cart_summary: text(fields, "cartSummary"),
            items,
            total,
        }),
        _ => Err(AppError::Validation(errors.join(" "))),
    }
}

fn first_alias(fields: &Map<String, Value>, canonical: &str) -> Option<String> {
    TRAINING_ALIASES
        .iter()
        .find(|(name, _)| *name == canonical)
        .and_then(|(_, keys)| keys.iter().find_map(|key| text(fields, key)))
}

/// Validates and normalizes a training registration.
///
/// Accepts either the Portuguese or the English field names; the first
/// non-empty alias wins.
pub fn sanitize_training(body: &Value) -> Result<TrainingPayload> {
    let empty = Map::new();
    let fields = body.as_object().unwrap_or(&empty);
    let mut errors = Vec::new();

    let nome = first_alias(fields, "nome");
    if nome.is_none() {
        errors.push("Name is required.");
    }
    let email = first_alias(fields, "email");
    if email.is_none() {
        errors.push("Email is required.");
    }
    let formacao = first_alias(fields, "formacao");
    if formacao.is_none() {
        errors.push("Training area is required.");
    }

    match (nome, email, formacao) {
        (Some(nome), Some(email), Some(formacao)) => Ok(TrainingPayload {
            nome,
            email,
            formacao,
            telefone: first_alias(fields, "telefone"),
            mensagem: first_alias(fields, "mensagem"),
        }),
        _ => Err(AppError::Validation(errors.join(" "))),
    }
}
