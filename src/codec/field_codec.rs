use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use crate::core::error::{Error, Result};
use crate::core::types::{FieldValue, StoredValue};
use crate::schema::schema::FieldType;

const INT32_OFFSET: i64 = 1 << 31;
const INT64_SIGN_BIT: u64 = 1 << 63;

/// Second resolution, fixed width, sorts lexicographically for years 0000-9999
const DATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// Encodes scalar values so that byte order of the encoding equals value order
pub struct FieldCodec;

impl FieldCodec {
    /// Shift into unsigned space and render as 8 hex digits
    pub fn encode_int32(value: i32) -> String {
        let shifted = value as i64 + INT32_OFFSET;
        format!("{:08x}", shifted)
    }

    pub fn decode_int32(text: &str) -> Result<i32> {
        let unsigned = parse_hex(text)?;
        let value = unsigned as i64 - INT32_OFFSET;
        i32::try_from(value)
            .map_err(|_| Error::Format(format!("'{}' is out of range for int32", text)))
    }

    /// Offset by 2^63 and render as 16 hex digits
    pub fn encode_int64(value: i64) -> String {
        let unsigned = if value >= 0 {
            value as u64 | INT64_SIGN_BIT
        } else {
            (value as u64).wrapping_add(INT64_SIGN_BIT)
        };
        format!("{:016x}", unsigned)
    }

    pub fn decode_int64(text: &str) -> Result<i64> {
        let unsigned = parse_hex(text)?;
        // Widen so the subtraction cannot overflow
        let value = unsigned as i128 - INT64_SIGN_BIT as i128;
        i64::try_from(value)
            .map_err(|_| Error::Format(format!("'{}' is out of range for int64", text)))
    }

    /// Years outside 0000-9999 have no fixed-width form and are rejected
    pub fn encode_date(value: &DateTime<Utc>) -> Result<String> {
        if !(0..=9999).contains(&value.year()) {
            return Err(Error::Format(format!("date {} is outside years 0000-9999", value)));
        }
        Ok(value.format(DATE_FORMAT).to_string())
    }

    pub fn decode_date(text: &str) -> Result<DateTime<Utc>> {
        if text.len() != 14 || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Format(format!("'{}' is not an encoded date", text)));
        }
        NaiveDateTime::parse_from_str(text, DATE_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|e| Error::Format(format!("'{}' is not an encoded date: {}", text, e)))
    }

    pub fn encode_bool(value: bool) -> [u8; 1] {
        [value as u8]
    }

    pub fn decode_bool(bytes: &[u8]) -> Result<bool> {
        match bytes {
            [0] => Ok(false),
            [1] => Ok(true),
            [other] => Err(Error::Format(format!("invalid boolean byte {}", other))),
            _ => Err(Error::InvalidArgument(format!(
                "boolean must be exactly 1 byte, got {}",
                bytes.len()
            ))),
        }
    }

    pub fn encode_int32_to_binary(value: i32) -> [u8; 4] {
        value.to_be_bytes()
    }

    pub fn decode_int32_from_binary(bytes: &[u8]) -> Result<i32> {
        let fixed: [u8; 4] = bytes.try_into()
            .map_err(|_| Error::Format(format!("int32 must be exactly 4 bytes, got {}", bytes.len())))?;
        Ok(i32::from_be_bytes(fixed))
    }

    pub fn encode_int64_to_binary(value: i64) -> [u8; 8] {
        value.to_be_bytes()
    }

    pub fn decode_int64_from_binary(bytes: &[u8]) -> Result<i64> {
        let fixed: [u8; 8] = bytes.try_into()
            .map_err(|_| Error::Format(format!("int64 must be exactly 8 bytes, got {}", bytes.len())))?;
        Ok(i64::from_be_bytes(fixed))
    }

    /// Epoch seconds as 8 big-endian bytes
    pub fn encode_date_to_binary(value: &DateTime<Utc>) -> [u8; 8] {
        Self::encode_int64_to_binary(value.timestamp())
    }

    pub fn decode_date_from_binary(bytes: &[u8]) -> Result<DateTime<Utc>> {
        let seconds = Self::decode_int64_from_binary(bytes)?;
        DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| Error::Format(format!("timestamp {} is out of range", seconds)))
    }

    /// Sortable text form used for index terms and sort keys
    pub fn index_term(value: &FieldValue) -> Result<String> {
        Ok(match value {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Int32(v) => Self::encode_int32(*v),
            FieldValue::Int64(v) => Self::encode_int64(*v),
            FieldValue::Boolean(v) => v.to_string(),
            FieldValue::Date(v) => Self::encode_date(v)?,
        })
    }

    /// Parse a query literal as `field_type` and return its index term
    pub fn encode_term(field_type: FieldType, raw: &str) -> Result<String> {
        let value = Self::parse_literal(field_type, raw)?;
        Self::index_term(&value)
    }

    pub fn parse_literal(field_type: FieldType, raw: &str) -> Result<FieldValue> {
        let trimmed = raw.trim();
        let value = match field_type {
            FieldType::Text => FieldValue::Text(raw.to_string()),
            FieldType::Int32 => FieldValue::Int32(trimmed.parse()
                .map_err(|_| Error::Format(format!("'{}' is not a valid int32", raw)))?),
            FieldType::Int64 => FieldValue::Int64(trimmed.parse()
                .map_err(|_| Error::Format(format!("'{}' is not a valid int64", raw)))?),
            FieldType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" => FieldValue::Boolean(true),
                "false" => FieldValue::Boolean(false),
                _ => return Err(Error::Format(format!("'{}' is not a valid boolean", raw))),
            },
            FieldType::Date => FieldValue::Date(parse_date_literal(trimmed)?),
        };
        Ok(value)
    }

    pub fn encode_stored(value: &FieldValue) -> StoredValue {
        match value {
            FieldValue::Text(text) => StoredValue::Text(text.clone()),
            FieldValue::Int32(v) => StoredValue::Binary(Self::encode_int32_to_binary(*v).to_vec()),
            FieldValue::Int64(v) => StoredValue::Binary(Self::encode_int64_to_binary(*v).to_vec()),
            FieldValue::Boolean(v) => StoredValue::Binary(Self::encode_bool(*v).to_vec()),
            FieldValue::Date(v) => StoredValue::Binary(Self::encode_date_to_binary(v).to_vec()),
        }
    }

    pub fn decode_stored(field_type: FieldType, stored: &StoredValue) -> Result<FieldValue> {
        match (field_type, stored) {
            (FieldType::Text, StoredValue::Text(text)) => Ok(FieldValue::Text(text.clone())),
            (FieldType::Int32, StoredValue::Binary(b)) => Ok(FieldValue::Int32(Self::decode_int32_from_binary(b)?)),
            (FieldType::Int64, StoredValue::Binary(b)) => Ok(FieldValue::Int64(Self::decode_int64_from_binary(b)?)),
            (FieldType::Boolean, StoredValue::Binary(b)) => Ok(FieldValue::Boolean(Self::decode_bool(b)?)),
            (FieldType::Date, StoredValue::Binary(b)) => Ok(FieldValue::Date(Self::decode_date_from_binary(b)?)),
            (expected, _) => Err(Error::Format(format!(
                "stored value does not match declared type {:?}",
                expected
            ))),
        }
    }
}

fn parse_hex(text: &str) -> Result<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::Format(format!("'{}' is not hexadecimal", text)));
    }
    u64::from_str_radix(text, 16)
        .map_err(|e| Error::Format(format!("'{}' is not hexadecimal: {}", text, e)))
}

fn parse_date_literal(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Ok(date.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(naive) = day.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    FieldCodec::decode_date(raw)
        .map_err(|_| Error::Format(format!("'{}' is not a recognised date", raw)))
}
