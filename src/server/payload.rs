//! Helpers for the untyped `google.protobuf.Struct` payload every client
//! envelope carries. Writers build keyed maps; readers pull typed values out
//! and shrug off anything malformed (`None`), which the handlers surface as
//! a validation error.

use prost_types::value::Kind;
use prost_types::{ListValue, Struct, Value};

pub fn text(value: impl Into<String>) -> Value {
    Value {
        kind: Some(Kind::StringValue(value.into())),
    }
}

pub fn number(value: f64) -> Value {
    Value {
        kind: Some(Kind::NumberValue(value)),
    }
}

pub fn null() -> Value {
    Value {
        kind: Some(Kind::NullValue(0)),
    }
}

pub fn string_list<I, T>(items: I) -> Value
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    Value {
        kind: Some(Kind::ListValue(ListValue {
            values: items.into_iter().map(text).collect(),
        })),
    }
}

pub fn id_list(ids: &[u64]) -> Value {
    Value {
        kind: Some(Kind::ListValue(ListValue {
            values: ids.iter().map(|id| number(*id as f64)).collect(),
        })),
    }
}

pub fn nested(fields: Struct) -> Value {
    Value {
        kind: Some(Kind::StructValue(fields)),
    }
}

pub fn value_list(values: impl IntoIterator<Item = Value>) -> Value {
    Value {
        kind: Some(Kind::ListValue(ListValue {
            values: values.into_iter().collect(),
        })),
    }
}

pub fn object<const N: usize>(fields: [(&str, Value); N]) -> Struct {
    Struct {
        fields: fields
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect(),
    }
}

pub fn empty() -> Struct {
    Struct::default()
}

pub fn get_str<'a>(payload: &'a Struct, key: &str) -> Option<&'a str> {
    match payload.fields.get(key)?.kind.as_ref()? {
        Kind::StringValue(value) => Some(value),
        _ => None,
    }
}

pub fn get_f64(payload: &Struct, key: &str) -> Option<f64> {
    match payload.fields.get(key)?.kind.as_ref()? {
        Kind::NumberValue(value) => Some(*value),
        _ => None,
    }
}

pub fn get_u64(payload: &Struct, key: &str) -> Option<u64> {
    let value = get_f64(payload, key)?;
    if value.is_sign_negative() {
        return None;
    }
    Some(value as u64)
}

/// A list of non-negative integers (message ids). A list holding anything
/// else is rejected wholesale.
pub fn get_id_list(payload: &Struct, key: &str) -> Option<Vec<u64>> {
    let list = match payload.fields.get(key)?.kind.as_ref()? {
        Kind::ListValue(list) => list,
        _ => return None,
    };
    list.values
        .iter()
        .map(|value| match value.kind.as_ref()? {
            Kind::NumberValue(n) if !n.is_sign_negative() => Some(*n as u64),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_what_it_writes() {
        let payload = object([
            ("username", text("alice")),
            ("limit", number(25.0)),
            ("ids", id_list(&[3, 1, 4])),
            ("accounts", string_list(["a", "b"])),
        ]);

        assert_eq!(get_str(&payload, "username"), Some("alice"));
        assert_eq!(get_u64(&payload, "limit"), Some(25));
        assert_eq!(get_id_list(&payload, "ids"), Some(vec![3, 1, 4]));
    }

    #[test]
    fn type_confusion_reads_as_absent() {
        let payload = object([("username", number(7.0)), ("ids", text("nope"))]);

        assert_eq!(get_str(&payload, "username"), None);
        assert_eq!(get_u64(&payload, "username"), Some(7));
        assert_eq!(get_id_list(&payload, "ids"), None);
        assert_eq!(get_str(&payload, "missing"), None);
    }

    #[test]
    fn negative_ids_are_rejected() {
        let payload = object([("ids", id_list(&[1])), ("bad", number(-3.0))]);
        assert_eq!(get_u64(&payload, "bad"), None);

        let mixed = Struct {
            fields: [(
                "ids".to_string(),
                Value {
                    kind: Some(Kind::ListValue(ListValue {
                        values: vec![number(1.0), number(-2.0)],
                    })),
                },
            )]
            .into_iter()
            .collect(),
        };
        assert_eq!(get_id_list(&mixed, "ids"), None);
    }
}
