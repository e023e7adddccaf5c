//! PackStream encoding for the Bolt wire format.
//!
//! Covers the value space this client sends and receives: scalars,
//! strings, byte arrays, lists, maps, and message structures. Graph
//! entity structures never appear in procedure-call traffic and are
//! rejected on decode.

use std::collections::HashMap;

use bytes::{Buf, BufMut, BytesMut};

use crate::model::Value;
use crate::{Error, Result};

// Marker bytes
const NULL: u8 = 0xC0;
const FLOAT_64: u8 = 0xC1;
const FALSE: u8 = 0xC2;
const TRUE: u8 = 0xC3;
const INT_8: u8 = 0xC8;
const INT_16: u8 = 0xC9;
const INT_32: u8 = 0xCA;
const INT_64: u8 = 0xCB;
const BYTES_8: u8 = 0xCC;
const BYTES_16: u8 = 0xCD;
const BYTES_32: u8 = 0xCE;
const STRING_8: u8 = 0xD0;
const STRING_16: u8 = 0xD1;
const STRING_32: u8 = 0xD2;
const LIST_8: u8 = 0xD4;
const LIST_16: u8 = 0xD5;
const LIST_32: u8 = 0xD6;
const MAP_8: u8 = 0xD8;
const MAP_16: u8 = 0xD9;
const MAP_32: u8 = 0xDA;

// ============================================================================
// Encoding
// ============================================================================

pub fn write_value(buf: &mut BytesMut, value: &Value) {
    match value {
        Value::Null => buf.put_u8(NULL),
        Value::Bool(true) => buf.put_u8(TRUE),
        Value::Bool(false) => buf.put_u8(FALSE),
        Value::Int(i) => write_int(buf, *i),
        Value::Float(f) => {
            buf.put_u8(FLOAT_64);
            buf.put_f64(*f);
        }
        Value::String(s) => write_string(buf, s),
        Value::Bytes(b) => {
            match b.len() {
                n if n <= 0xFF => {
                    buf.put_u8(BYTES_8);
                    buf.put_u8(n as u8);
                }
                n if n <= 0xFFFF => {
                    buf.put_u8(BYTES_16);
                    buf.put_u16(n as u16);
                }
                n => {
                    buf.put_u8(BYTES_32);
                    buf.put_u32(n as u32);
                }
            }
            buf.put_slice(b);
        }
        Value::List(items) => {
            write_list_header(buf, items.len());
            for item in items {
                write_value(buf, item);
            }
        }
        Value::Map(map) => {
            write_map_header(buf, map.len());
            for (k, v) in map {
                write_string(buf, k);
                write_value(buf, v);
            }
        }
        // Temporal values travel in their tabular spellings.
        Value::Date(d) => write_string(buf, &d.to_string()),
        Value::DateTime(dt) => write_string(buf, &dt.to_rfc3339()),
        Value::DurationMillis(ms) => write_int(buf, *ms),
    }
}

pub fn write_int(buf: &mut BytesMut, i: i64) {
    match i {
        -16..=127 => buf.put_i8(i as i8),
        -128..=127 => {
            buf.put_u8(INT_8);
            buf.put_i8(i as i8);
        }
        -32_768..=32_767 => {
            buf.put_u8(INT_16);
            buf.put_i16(i as i16);
        }
        -2_147_483_648..=2_147_483_647 => {
            buf.put_u8(INT_32);
            buf.put_i32(i as i32);
        }
        _ => {
            buf.put_u8(INT_64);
            buf.put_i64(i);
        }
    }
}

pub fn write_string(buf: &mut BytesMut, s: &str) {
    let bytes = s.as_bytes();
    match bytes.len() {
        n if n < 16 => buf.put_u8(0x80 | n as u8),
        n if n <= 0xFF => {
            buf.put_u8(STRING_8);
            buf.put_u8(n as u8);
        }
        n if n <= 0xFFFF => {
            buf.put_u8(STRING_16);
            buf.put_u16(n as u16);
        }
        n => {
            buf.put_u8(STRING_32);
            buf.put_u32(n as u32);
        }
    }
    buf.put_slice(bytes);
}

pub fn write_list_header(buf: &mut BytesMut, len: usize) {
    match len {
        n if n < 16 => buf.put_u8(0x90 | n as u8),
        n if n <= 0xFF => {
            buf.put_u8(LIST_8);
            buf.put_u8(n as u8);
        }
        n if n <= 0xFFFF => {
            buf.put_u8(LIST_16);
            buf.put_u16(n as u16);
        }
        n => {
            buf.put_u8(LIST_32);
            buf.put_u32(n as u32);
        }
    }
}

pub fn write_map_header(buf: &mut BytesMut, len: usize) {
    match len {
        n if n < 16 => buf.put_u8(0xA0 | n as u8),
        n if n <= 0xFF => {
            buf.put_u8(MAP_8);
            buf.put_u8(n as u8);
        }
        n if n <= 0xFFFF => {
            buf.put_u8(MAP_16);
            buf.put_u16(n as u16);
        }
        n => {
            buf.put_u8(MAP_32);
            buf.put_u32(n as u32);
        }
    }
}

/// Message structure header: field count, then the message tag.
pub fn write_struct_header(buf: &mut BytesMut, tag: u8, fields: usize) {
    debug_assert!(fields < 16);
    buf.put_u8(0xB0 | fields as u8);
    buf.put_u8(tag);
}

// ============================================================================
// Decoding
// ============================================================================

/// A decoded message structure: tag plus its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub tag: u8,
    pub fields: Vec<Value>,
}

fn need(buf: &mut impl Buf, n: usize) -> Result<()> {
    if buf.remaining() < n {
        return Err(Error::Protocol("truncated PackStream value".into()));
    }
    Ok(())
}

fn read_sized(buf: &mut impl Buf, marker: u8, base8: u8) -> Result<usize> {
    Ok(match marker {
        m if m == base8 => {
            need(buf, 1)?;
            buf.get_u8() as usize
        }
        m if m == base8 + 1 => {
            need(buf, 2)?;
            buf.get_u16() as usize
        }
        m if m == base8 + 2 => {
            need(buf, 4)?;
            buf.get_u32() as usize
        }
        _ => unreachable!("caller matched the marker family"),
    })
}

fn read_raw(buf: &mut impl Buf, len: usize) -> Result<Vec<u8>> {
    need(buf, len)?;
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

fn read_string_body(buf: &mut impl Buf, len: usize) -> Result<String> {
    String::from_utf8(read_raw(buf, len)?)
        .map_err(|_| Error::Protocol("invalid UTF-8 in PackStream string".into()))
}

/// Decode one message structure.
pub fn read_struct(buf: &mut impl Buf) -> Result<Structure> {
    need(buf, 2)?;
    let marker = buf.get_u8();
    if marker & 0xF0 != 0xB0 {
        return Err(Error::Protocol(format!("expected structure, got marker 0x{marker:02X}")));
    }
    let field_count = (marker & 0x0F) as usize;
    let tag = buf.get_u8();
    let mut fields = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        fields.push(read_value(buf)?);
    }
    Ok(Structure { tag, fields })
}

/// Decode one value.
pub fn read_value(buf: &mut impl Buf) -> Result<Value> {
    need(buf, 1)?;
    let marker = buf.get_u8();
    Ok(match marker {
        // Tiny int (positive and negative ranges share the marker space)
        0x00..=0x7F => Value::Int(marker as i64),
        0xF0..=0xFF => Value::Int(marker as i8 as i64),
        NULL => Value::Null,
        TRUE => Value::Bool(true),
        FALSE => Value::Bool(false),
        FLOAT_64 => {
            need(buf, 8)?;
            Value::Float(buf.get_f64())
        }
        INT_8 => {
            need(buf, 1)?;
            Value::Int(buf.get_i8() as i64)
        }
        INT_16 => {
            need(buf, 2)?;
            Value::Int(buf.get_i16() as i64)
        }
        INT_32 => {
            need(buf, 4)?;
            Value::Int(buf.get_i32() as i64)
        }
        INT_64 => {
            need(buf, 8)?;
            Value::Int(buf.get_i64())
        }
        BYTES_8 | BYTES_16 | BYTES_32 => {
            let len = read_sized(buf, marker, BYTES_8)?;
            Value::Bytes(read_raw(buf, len)?)
        }
        0x80..=0x8F => Value::String(read_string_body(buf, (marker & 0x0F) as usize)?),
        STRING_8 | STRING_16 | STRING_32 => {
            let len = read_sized(buf, marker, STRING_8)?;
            Value::String(read_string_body(buf, len)?)
        }
        0x90..=0x9F => read_list(buf, (marker & 0x0F) as usize)?,
        LIST_8 | LIST_16 | LIST_32 => {
            let len = read_sized(buf, marker, LIST_8)?;
            read_list(buf, len)?
        }
        0xA0..=0xAF => read_map(buf, (marker & 0x0F) as usize)?,
        MAP_8 | MAP_16 | MAP_32 => {
            let len = read_sized(buf, marker, MAP_8)?;
            read_map(buf, len)?
        }
        0xB0..=0xBF => {
            return Err(Error::Protocol(
                "structure values inside records are not supported by this client".into(),
            ));
        }
        other => {
            return Err(Error::Protocol(format!("unknown PackStream marker 0x{other:02X}")));
        }
    })
}

fn read_list(buf: &mut impl Buf, len: usize) -> Result<Value> {
    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        items.push(read_value(buf)?);
    }
    Ok(Value::List(items))
}

fn read_map(buf: &mut impl Buf, len: usize) -> Result<Value> {
    let mut map = HashMap::with_capacity(len);
    for _ in 0..len {
        let key = match read_value(buf)? {
            Value::String(s) => s,
            other => {
                return Err(Error::Protocol(format!(
                    "map key must be a string, got {}",
                    other.type_name()
                )));
            }
        };
        map.insert(key, read_value(buf)?);
    }
    Ok(Value::Map(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: Value) {
        let mut buf = BytesMut::new();
        write_value(&mut buf, &value);
        let mut bytes = buf.freeze();
        assert_eq!(read_value(&mut bytes).unwrap(), value);
        assert!(!bytes.has_remaining());
    }

    #[test]
    fn scalars_round_trip() {
        round_trip(Value::Null);
        round_trip(Value::Bool(true));
        round_trip(Value::Int(0));
        round_trip(Value::Int(-1));
        round_trip(Value::Int(-17));
        round_trip(Value::Int(127));
        round_trip(Value::Int(32_000));
        round_trip(Value::Int(i64::MAX));
        round_trip(Value::Int(i64::MIN));
        round_trip(Value::Float(3.5));
        round_trip(Value::String("gds.pageRank.stream".into()));
        round_trip(Value::String("x".repeat(300)));
        round_trip(Value::Bytes(vec![0, 1, 2, 255]));
    }

    #[test]
    fn containers_round_trip() {
        round_trip(Value::List(vec![Value::Int(1), Value::String("a".into()), Value::Null]));
        round_trip(Value::Map(HashMap::from([
            ("graphName".to_string(), Value::String("g".into())),
            ("concurrency".to_string(), Value::Int(4)),
        ])));
    }

    #[test]
    fn structure_header_round_trips() {
        let mut buf = BytesMut::new();
        write_struct_header(&mut buf, 0x10, 3);
        write_string(&mut buf, "RETURN 1");
        write_map_header(&mut buf, 0);
        write_map_header(&mut buf, 0);

        let mut bytes = buf.freeze();
        let message = read_struct(&mut bytes).unwrap();
        assert_eq!(message.tag, 0x10);
        assert_eq!(message.fields.len(), 3);
        assert_eq!(message.fields[0], Value::String("RETURN 1".into()));
    }

    #[test]
    fn truncated_input_is_a_protocol_error() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "hello");
        let bytes = buf.freeze();
        let mut short = bytes.slice(0..3);
        assert!(matches!(read_value(&mut short), Err(Error::Protocol(_))));
    }
}
