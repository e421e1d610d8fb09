//! Conversion between plain JSON and Firestore's typed value encoding.

use serde_json::{Map, Number, Value, json};

/// Encode a JSON object as a Firestore `fields` map.
pub fn to_fields(data: &Map<String, Value>) -> Map<String, Value> {
    data.iter()
        .map(|(k, v)| (k.clone(), to_firestore_value(v)))
        .collect()
}

pub fn to_firestore_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(to_firestore_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": to_fields(map) } }),
    }
}

/// Decode a Firestore `fields` map into a JSON object.
pub fn from_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), from_firestore_value(v)))
        .collect()
}

/// Timestamps, references and bytes decode to strings; geo points to `{latitude, longitude}`.
pub fn from_firestore_value(value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return Value::Null;
    };
    let Some((kind, inner)) = obj.iter().next() else {
        return Value::Null;
    };
    match kind.as_str() {
        "booleanValue" => Value::Bool(inner.as_bool().unwrap_or_default()),
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .or_else(|| inner.as_i64())
            .map(Value::from)
            .unwrap_or(Value::Null),
        "doubleValue" => inner
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "geoPointValue" => json!({
            "latitude": inner.get("latitude").cloned().unwrap_or(json!(0.0)),
            "longitude": inner.get("longitude").cloned().unwrap_or(json!(0.0)),
        }),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(from_firestore_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(from_fields)
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}

/// Quote a field name for an update mask unless it is a plain identifier.
pub fn quote_field_path(field: &str) -> String {
    let mut chars = field.chars();
    let simple = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        field.to_string()
    } else {
        format!("`{}`", field.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_scalars_and_nesting() {
        let data = json!({
            "name": "Ada",
            "age": 36,
            "score": 1.5,
            "admin": false,
            "nickname": null,
            "tags": ["a", 1],
            "address": { "city": "London" }
        });
        let fields = to_fields(data.as_object().unwrap());

        assert_eq!(fields["name"], json!({ "stringValue": "Ada" }));
        assert_eq!(fields["age"], json!({ "integerValue": "36" }));
        assert_eq!(fields["score"], json!({ "doubleValue": 1.5 }));
        assert_eq!(fields["admin"], json!({ "booleanValue": false }));
        assert_eq!(fields["nickname"], json!({ "nullValue": null }));
        assert_eq!(
            fields["tags"],
            json!({ "arrayValue": { "values": [
                { "stringValue": "a" },
                { "integerValue": "1" }
            ] } })
        );
        assert_eq!(
            fields["address"],
            json!({ "mapValue": { "fields": { "city": { "stringValue": "London" } } } })
        );
    }

    #[test]
    fn decodes_server_only_types() {
        let fields = json!({
            "created": { "timestampValue": "2024-01-01T00:00:00Z" },
            "owner": { "referenceValue": "projects/p/databases/(default)/documents/users/a" },
            "where": { "geoPointValue": { "latitude": 51.5, "longitude": -0.1 } },
            "count": { "integerValue": "9007199254740993" },
            "empty": { "arrayValue": {} }
        });
        let data = from_fields(fields.as_object().unwrap());

        assert_eq!(data["created"], "2024-01-01T00:00:00Z");
        assert_eq!(
            data["owner"],
            "projects/p/databases/(default)/documents/users/a"
        );
        assert_eq!(data["where"], json!({ "latitude": 51.5, "longitude": -0.1 }));
        assert_eq!(data["count"], json!(9007199254740993_i64));
        assert_eq!(data["empty"], json!([]));
    }

    #[test]
    fn quotes_non_identifier_field_names() {
        assert_eq!(quote_field_path("display_name"), "display_name");
        assert_eq!(quote_field_path("first name"), "`first name`");
        assert_eq!(quote_field_path("1st"), "`1st`");
        assert_eq!(quote_field_path("a`b"), "`a\\`b`");
    }
}
