//! Request body normalisation.
//!
//! Clients send the same field under several names (`productId`,
//! `id_producto`, `cantidad`, ...). Every body is rewritten to canonical
//! snake_case keys before any handler looks at it, and [`Fields`] then reads
//! typed values out of the normalised object.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Accepted alias and the canonical key it is rewritten to.
const ALIASES: &[(&str, &str)] = &[
    ("productId", "product_id"),
    ("id_producto", "product_id"),
    ("producto_id", "product_id"),
    ("cantidad", "quantity"),
    ("precio", "unit_price"),
    ("price", "unit_price"),
    ("precio_unitario", "unit_price"),
    ("unitPrice", "unit_price"),
    ("userId", "user_id"),
    ("usuario_id", "user_id"),
    ("id_usuario", "user_id"),
    ("sellerId", "seller_id"),
    ("vendedor_id", "seller_id"),
    ("id_vendedor", "seller_id"),
    ("fecha_pago", "paid_at"),
    ("paidAt", "paid_at"),
    ("estado", "state"),
    ("status", "state"),
    ("nombre_cliente", "customer_name"),
    ("customerName", "customer_name"),
    ("direccion", "customer_address"),
    ("address", "customer_address"),
    ("customerAddress", "customer_address"),
    ("telefono", "customer_phone"),
    ("phone", "customer_phone"),
    ("customerPhone", "customer_phone"),
    ("documento", "document"),
    ("rut", "document"),
    ("nombre", "name"),
    ("categoria", "category"),
    ("proveedor_id", "supplier_id"),
    ("id_proveedor", "supplier_id"),
    ("supplierId", "supplier_id"),
    ("descripcion", "description"),
    ("nota", "description"),
    ("note", "description"),
    ("accion", "action"),
    ("pedido_id", "request_id"),
    ("id_pedido", "request_id"),
    ("requestId", "request_id"),
    ("ids", "order_line_ids"),
    ("orderLineIds", "order_line_ids"),
    ("detalle_ids", "order_line_ids"),
];

/// Maps an accepted alias to its canonical key. Unknown keys map to
/// themselves.
pub fn canonical_key(key: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map_or(key, |(_, canonical)| *canonical)
}

/// Rewrites every alias to its canonical key. A canonical key sent verbatim
/// wins over any alias of it.
pub fn normalize(object: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    let mut aliased = Vec::new();
    for (key, value) in object {
        let canonical = canonical_key(&key);
        if canonical == key {
            out.insert(key, value);
        } else {
            aliased.push((canonical.to_string(), value));
        }
    }
    for (key, value) in aliased {
        out.entry(key).or_insert(value);
    }
    out
}

/// A normalised JSON object with typed accessors.
///
/// Accessors treat an absent key and an explicit `null` the same, except the
/// `nullable_*` variants, which report `Some(None)` for `null` so a patch can
/// clear a column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Map<String, Value>);

impl Fields {
    pub fn from_value(value: Value) -> Result<Self, ApiError> {
        match value {
            Value::Object(object) => Ok(Self(normalize(object))),
            _ => Err(ApiError::BadRequest(
                "request body must be a JSON object".to_string(),
            )),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    fn value(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn integer(&self, key: &str) -> Result<Option<i64>, ApiError> {
        self.value(key)
            .map(|v| as_integer(v).ok_or_else(|| ApiError::invalid(key, "must be an integer")))
            .transpose()
    }

    pub fn require_integer(&self, key: &str) -> Result<i64, ApiError> {
        self.integer(key)?.ok_or_else(|| ApiError::missing(key))
    }

    pub fn nullable_integer(&self, key: &str) -> Result<Option<Option<i64>>, ApiError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::Null) => Ok(Some(None)),
            Some(_) => self.integer(key).map(Some),
        }
    }

    pub fn decimal(&self, key: &str) -> Result<Option<Decimal>, ApiError> {
        self.value(key)
            .map(|v| as_decimal(v).ok_or_else(|| ApiError::invalid(key, "must be a number")))
            .transpose()
    }

    pub fn require_decimal(&self, key: &str) -> Result<Decimal, ApiError> {
        self.decimal(key)?.ok_or_else(|| ApiError::missing(key))
    }

    /// Reads a string. Numbers are accepted and kept as their decimal text,
    /// since documents and phone numbers often arrive unquoted.
    pub fn text(&self, key: &str) -> Result<Option<String>, ApiError> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(_) => Err(ApiError::invalid(key, "must be a string")),
        }
    }

    pub fn nullable_text(&self, key: &str) -> Result<Option<Option<String>>, ApiError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::Null) => Ok(Some(None)),
            Some(_) => self.text(key).map(Some),
        }
    }

    pub fn timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>, ApiError> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::String(s)) => parse_timestamp(s)
                .map(Some)
                .ok_or_else(|| ApiError::invalid(key, "must be an ISO 8601 date or timestamp")),
            Some(_) => Err(ApiError::invalid(key, "must be a string")),
        }
    }

    pub fn nullable_timestamp(
        &self,
        key: &str,
    ) -> Result<Option<Option<DateTime<Utc>>>, ApiError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::Null) => Ok(Some(None)),
            Some(_) => self.timestamp(key).map(Some),
        }
    }

    pub fn integer_list(&self, key: &str) -> Result<Option<Vec<i64>>, ApiError> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    as_integer(v).ok_or_else(|| ApiError::invalid(key, "must contain integers"))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(_) => Err(ApiError::invalid(key, "must be an array")),
        }
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    raw.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(&raw).ok())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Reads a positive-or-not integer id from a path segment.
pub fn path_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::invalid("id", "must be an integer"))
}

/// Looks up a query parameter under any of its aliases.
pub fn query_integer(
    params: &HashMap<String, String>,
    canonical: &str,
) -> Result<Option<i64>, ApiError> {
    let raw = params
        .iter()
        .find(|(key, _)| canonical_key(key) == canonical)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty());
    raw.map(|value| {
        value
            .parse()
            .map_err(|_| ApiError::invalid(canonical, "must be an integer"))
    })
    .transpose()
}

/// Extractor for a normalised JSON object body.
///
/// An empty body reads as an empty object, so endpoints whose fields are all
/// optional can be called without one.
pub struct JsonBody(pub Fields);

impl<S: Send + Sync> FromRequest<S> for JsonBody {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(Fields::default()));
        }
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|err| ApiError::BadRequest(format!("invalid JSON body: {err}")))?;
        Fields::from_value(value).map(Self)
    }
}
