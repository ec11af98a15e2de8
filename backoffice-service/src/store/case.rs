//! camelCase <-> snake_case key translation at the PostgreSQL boundary.

use serde_json::Value;

pub fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

pub fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for ch in key.chars() {
        if ch == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Rewrites every object key in `value`, descending into arrays and nested objects.
pub fn convert_keys(value: Value, convert: fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (convert(&k), convert_keys(v, convert)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| convert_keys(v, convert)).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_single_keys() {
        assert_eq!(camel_to_snake("vatOnCommission"), "vat_on_commission");
        assert_eq!(camel_to_snake("id"), "id");
        assert_eq!(snake_to_camel("qr_code_tlv"), "qrCodeTlv");
        assert_eq!(snake_to_camel("total"), "total");
    }

    #[test]
    fn nested_invoice_items_round_trip() {
        let camel = json!({
            "invoiceNo": "INV-2024-0001",
            "items": [{ "unitPrice": 2300, "lineTotal": 2300 }]
        });
        let snake = convert_keys(camel.clone(), camel_to_snake);
        assert_eq!(snake["invoice_no"], "INV-2024-0001");
        assert_eq!(snake["items"][0]["line_total"], 2300);
        assert_eq!(convert_keys(snake, snake_to_camel), camel);
    }
}
