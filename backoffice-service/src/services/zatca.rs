//! ZATCA e-invoice QR payload.
//!
//! The payload is a sequence of tag-length-value fields (one tag byte, one
//! length byte holding the UTF-8 byte length, then the value bytes) for the
//! seller name, VAT number, timestamp, invoice total and VAT total, encoded
//! as standard padded base64.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use image::{DynamicImage, Luma};
use qrcode::QrCode;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::io::Cursor;
use thiserror::Error;

pub const TAG_SELLER_NAME: u8 = 1;
pub const TAG_VAT_NUMBER: u8 = 2;
pub const TAG_TIMESTAMP: u8 = 3;
pub const TAG_INVOICE_TOTAL: u8 = 4;
pub const TAG_VAT_TOTAL: u8 = 5;

#[derive(Debug, Error, PartialEq)]
pub enum ZatcaError {
    #[error("value for tag {tag} is {len} bytes; at most 255 are allowed")]
    ValueTooLong { tag: u8, len: usize },

    #[error("TLV payload is not valid base64")]
    InvalidBase64,

    #[error("TLV payload is truncated at byte {0}")]
    Truncated(usize),

    #[error("value for tag {0} is not valid UTF-8")]
    InvalidUtf8(u8),
}

impl From<ZatcaError> for AppError {
    fn from(err: ZatcaError) -> Self {
        AppError::BadRequest(err.into())
    }
}

/// Encodes `(tag, value)` pairs in the order given.
pub fn encode_tlv(fields: &[(u8, &str)]) -> Result<Vec<u8>, ZatcaError> {
    let mut out = Vec::with_capacity(fields.iter().map(|(_, v)| v.len() + 2).sum());
    for (tag, value) in fields {
        let bytes = value.as_bytes();
        let len = u8::try_from(bytes.len()).map_err(|_| ZatcaError::ValueTooLong {
            tag: *tag,
            len: bytes.len(),
        })?;
        out.push(*tag);
        out.push(len);
        out.extend_from_slice(bytes);
    }
    Ok(out)
}

/// Base64 TLV payload for the five mandatory fields.
pub fn generate_tlv_base64(
    seller_name: &str,
    vat_number: &str,
    timestamp: &str,
    invoice_total: &str,
    vat_total: &str,
) -> Result<String, ZatcaError> {
    let bytes = encode_tlv(&[
        (TAG_SELLER_NAME, seller_name),
        (TAG_VAT_NUMBER, vat_number),
        (TAG_TIMESTAMP, timestamp),
        (TAG_INVOICE_TOTAL, invoice_total),
        (TAG_VAT_TOTAL, vat_total),
    ])?;
    Ok(general_purpose::STANDARD.encode(bytes))
}

/// ISO-8601 UTC timestamp with millisecond precision, e.g. `2024-07-20T10:00:00.000Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Amount with exactly two decimals, e.g. `2330.00`.
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

/// Payload for an invoice issued at `at`.
pub fn invoice_tlv(
    seller_name: &str,
    vat_number: &str,
    at: DateTime<Utc>,
    invoice_total: Decimal,
    vat_total: Decimal,
) -> Result<String, ZatcaError> {
    generate_tlv_base64(
        seller_name,
        vat_number,
        &format_timestamp(at),
        &format_amount(invoice_total),
        &format_amount(vat_total),
    )
}

/// Recovers the `(tag, value)` pairs from a base64 payload.
pub fn decode_tlv_base64(payload: &str) -> Result<Vec<(u8, String)>, ZatcaError> {
    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|_| ZatcaError::InvalidBase64)?;

    let mut fields = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        if pos + 2 > bytes.len() {
            return Err(ZatcaError::Truncated(pos));
        }
        let tag = bytes[pos];
        let len = bytes[pos + 1] as usize;
        let start = pos + 2;
        let end = start + len;
        if end > bytes.len() {
            return Err(ZatcaError::Truncated(pos));
        }
        let value = std::str::from_utf8(&bytes[start..end])
            .map_err(|_| ZatcaError::InvalidUtf8(tag))?
            .to_string();
        fields.push((tag, value));
        pos = end;
    }
    Ok(fields)
}

/// Renders `data` as a QR code, returned as a base64-encoded PNG.
pub fn render_qr_png_base64(data: &str) -> Result<String, AppError> {
    let code = QrCode::new(data.as_bytes())
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Cannot encode QR code: {}", e)))?;
    let image = code.render::<Luma<u8>>().build();

    let dynamic_image = DynamicImage::ImageLuma8(image);
    let mut buffer = Cursor::new(Vec::new());
    dynamic_image
        .write_to(&mut buffer, image::ImageOutputFormat::Png)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to write PNG: {}", e)))?;

    Ok(general_purpose::STANDARD.encode(buffer.get_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn round_trip_recovers_fields_in_order() {
        let payload = generate_tlv_base64(
            "ARWA TRAVEL & EVENTS",
            "310263881300003",
            "2024-07-20T10:00:00.000Z",
            "2330.00",
            "30.00",
        )
        .unwrap();

        let fields = decode_tlv_base64(&payload).unwrap();
        assert_eq!(
            fields,
            vec![
                (1, "ARWA TRAVEL & EVENTS".to_string()),
                (2, "310263881300003".to_string()),
                (3, "2024-07-20T10:00:00.000Z".to_string()),
                (4, "2330.00".to_string()),
                (5, "30.00".to_string()),
            ]
        );
    }

    #[test]
    fn length_byte_counts_utf8_bytes() {
        let seller = "شركة أروى";
        let bytes = encode_tlv(&[(1, seller)]).unwrap();
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes[1] as usize, seller.len());
        assert!(seller.chars().count() < seller.len());
        assert_eq!(&bytes[2..], seller.as_bytes());
    }

    #[test]
    fn known_encoding() {
        let bytes = encode_tlv(&[(1, "AB"), (4, "1.00")]).unwrap();
        assert_eq!(bytes, vec![1, 2, b'A', b'B', 4, 4, b'1', b'.', b'0', b'0']);
    }

    #[test]
    fn overlong_value_is_rejected() {
        let long = "x".repeat(256);
        assert_eq!(
            encode_tlv(&[(1, &long)]),
            Err(ZatcaError::ValueTooLong { tag: 1, len: 256 })
        );
        assert!(encode_tlv(&[(1, &"x".repeat(255))]).is_ok());
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let mut bytes = encode_tlv(&[(1, "ARWA"), (2, "3102")]).unwrap();
        bytes.pop();
        let payload = general_purpose::STANDARD.encode(&bytes);
        assert_eq!(decode_tlv_base64(&payload), Err(ZatcaError::Truncated(6)));

        let dangling = general_purpose::STANDARD.encode([1u8]);
        assert_eq!(decode_tlv_base64(&dangling), Err(ZatcaError::Truncated(0)));
    }

    #[test]
    fn invoice_payload_formats_timestamp_and_totals() {
        let at = Utc.with_ymd_and_hms(2024, 7, 20, 10, 0, 0).unwrap();
        let payload = invoice_tlv(
            "ARWA TRAVEL & EVENTS",
            "310263881300003",
            at,
            Decimal::new(2330, 0),
            Decimal::new(225, 1),
        )
        .unwrap();

        let fields = decode_tlv_base64(&payload).unwrap();
        assert_eq!(fields[2].1, "2024-07-20T10:00:00.000Z");
        assert_eq!(fields[3].1, "2330.00");
        assert_eq!(fields[4].1, "22.50");
    }

    #[test]
    fn qr_png_has_png_signature() {
        let png = render_qr_png_base64("AQZBUldBIFRSQVZFTA==").unwrap();
        let bytes = general_purpose::STANDARD.decode(png).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
