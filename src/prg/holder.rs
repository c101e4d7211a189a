//! Instruction header encoding for the flat program buffer.
//!
//! Each node starts with one 64-bit header word:
//!
//! ```text
//!  63        48 47                      16 15         0
//! ┌────────────┬──────────────────────────┬────────────┐
//! │ param2 i16 │        param1 i32        │ opcode u16 │
//! └────────────┴──────────────────────────┴────────────┘
//! ```
//!
//! `#const` nodes are followed by payload words holding the constant; every
//! other opcode is a single word.

// Field packing reinterprets signed values as raw bits
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]

use super::opcode::Opcode;
use super::value::{ExpressionValue, ValueType};
use crate::error::{ProgramError, PrgResult};

const OPCODE_MASK: u64 = 0xFFFF;
const PARAM1_SHIFT: u32 = 16;
const PARAM1_MASK: u64 = 0xFFFF_FFFF;
const PARAM2_SHIFT: u32 = 48;

/// A decoded instruction header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Raw opcode value.
    pub opcode: u16,
    /// First parameter (variable index, string length, boolean value).
    pub param1: i32,
    /// Second parameter (constant type tag).
    pub param2: i16,
}

impl Header {
    /// Build a header for `opcode`.
    #[must_use]
    pub fn new(opcode: Opcode, param1: i32, param2: i16) -> Self {
        Self {
            opcode: opcode.as_u16(),
            param1,
            param2,
        }
    }

    /// Pack into a header word.
    #[must_use]
    pub fn encode(self) -> u64 {
        u64::from(self.opcode)
            | ((u64::from(self.param1 as u32)) << PARAM1_SHIFT)
            | ((u64::from(self.param2 as u16)) << PARAM2_SHIFT)
    }

    /// Unpack a header word.
    #[must_use]
    pub fn decode(word: u64) -> Self {
        Self {
            opcode: (word & OPCODE_MASK) as u16,
            param1: ((word >> PARAM1_SHIFT) & PARAM1_MASK) as u32 as i32,
            param2: (word >> PARAM2_SHIFT) as u16 as i16,
        }
    }
}

/// Read and validate the header at `index`.
///
/// # Errors
///
/// Returns [`ProgramError::Truncated`] past the end of the buffer and
/// [`ProgramError::UnknownOpcode`] for opcodes outside the table.
pub fn read_header(buffer: &[u64], index: usize) -> PrgResult<(Opcode, Header)> {
    let word = *buffer.get(index).ok_or(ProgramError::Truncated { index })?;
    let header = Header::decode(word);
    let opcode = Opcode::from_u16(header.opcode).ok_or(ProgramError::UnknownOpcode {
        opcode: header.opcode,
        index,
    })?;
    Ok((opcode, header))
}

/// Number of payload words following a header.
///
/// # Errors
///
/// Returns [`ProgramError::Truncated`] for a constant with a bad type tag or
/// a negative string length.
pub fn payload_words(opcode: Opcode, header: Header, index: usize) -> PrgResult<usize> {
    if opcode != Opcode::Const {
        return Ok(0);
    }
    match ValueType::from_tag(header.param2) {
        Some(ValueType::Float | ValueType::Int) => Ok(1),
        Some(ValueType::Bool) => Ok(0),
        Some(ValueType::Str) => {
            let len = usize::try_from(header.param1).map_err(|_| ProgramError::Truncated { index })?;
            Ok(len.div_ceil(8))
        }
        None => Err(ProgramError::Truncated { index }),
    }
}

/// Header width (header plus payload) of the node at `index`.
///
/// # Errors
///
/// Propagates decoding failures and fails if the payload runs past the end.
pub fn header_width(buffer: &[u64], index: usize) -> PrgResult<usize> {
    let (opcode, header) = read_header(buffer, index)?;
    let width = 1 + payload_words(opcode, header, index)?;
    if index + width > buffer.len() {
        return Err(ProgramError::Truncated { index });
    }
    Ok(width)
}

/// Append a single-word operator or function header.
pub(crate) fn push_op(out: &mut Vec<u64>, opcode: Opcode) {
    out.push(Header::new(opcode, 0, 0).encode());
}

/// Append a `#var` leaf reading variable `index`.
pub(crate) fn push_var(out: &mut Vec<u64>, index: usize) {
    let param1 = i32::try_from(index).unwrap_or(i32::MAX);
    out.push(Header::new(Opcode::Var, param1, 0).encode());
}

/// Append a `#const` leaf holding `value`.
pub(crate) fn push_const(out: &mut Vec<u64>, value: &ExpressionValue) {
    let tag = value.value_type().tag();
    match value {
        ExpressionValue::Float(v) => {
            out.push(Header::new(Opcode::Const, 0, tag).encode());
            out.push(v.to_bits());
        }
        ExpressionValue::Int(v) => {
            out.push(Header::new(Opcode::Const, 0, tag).encode());
            out.push(*v as u64);
        }
        ExpressionValue::Bool(v) => {
            out.push(Header::new(Opcode::Const, i32::from(*v), tag).encode());
        }
        ExpressionValue::Str(s) => {
            let bytes = s.as_bytes();
            let len = i32::try_from(bytes.len()).unwrap_or(i32::MAX);
            out.push(Header::new(Opcode::Const, len, tag).encode());
            for chunk in bytes.chunks(8) {
                let mut word = [0u8; 8];
                word[..chunk.len()].copy_from_slice(chunk);
                out.push(u64::from_le_bytes(word));
            }
        }
    }
}

/// Decode the constant stored at `index`.
///
/// # Errors
///
/// Fails if the node is not a well-formed `#const`.
pub fn read_const(buffer: &[u64], index: usize) -> PrgResult<ExpressionValue> {
    let (opcode, header) = read_header(buffer, index)?;
    let width = header_width(buffer, index)?;
    if opcode != Opcode::Const {
        return Err(ProgramError::TypeMismatch {
            expected: "#const",
            actual: opcode.name(),
        });
    }
    let payload = &buffer[index + 1..index + width];
    let value = match ValueType::from_tag(header.param2) {
        Some(ValueType::Float) => ExpressionValue::Float(f64::from_bits(payload[0])),
        Some(ValueType::Int) => ExpressionValue::Int(payload[0] as i64),
        Some(ValueType::Bool) => ExpressionValue::Bool(header.param1 != 0),
        Some(ValueType::Str) => {
            let len = usize::try_from(header.param1).map_err(|_| ProgramError::Truncated { index })?;
            let mut bytes: Vec<u8> = payload.iter().flat_map(|w| w.to_le_bytes()).collect();
            bytes.truncate(len);
            ExpressionValue::Str(String::from_utf8_lossy(&bytes).into_owned())
        }
        None => return Err(ProgramError::Truncated { index }),
    };
    Ok(value)
}

/// Overwrite the payload of the float constant at `index`.
///
/// # Errors
///
/// Fails unless `index` holds a float `#const`.
pub(crate) fn write_float_const(buffer: &mut [u64], index: usize, value: f64) -> PrgResult<()> {
    let (opcode, header) = read_header(buffer, index)?;
    if opcode != Opcode::Const || header.param2 != ValueType::Float.tag() {
        return Err(ProgramError::TypeMismatch {
            expected: "float",
            actual: opcode.name(),
        });
    }
    let slot = buffer
        .get_mut(index + 1)
        .ok_or(ProgramError::Truncated { index })?;
    *slot = value.to_bits();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_fields() {
        let h = Header::new(Opcode::Var, -5, -2);
        let decoded = Header::decode(h.encode());
        assert_eq!(decoded, h);
        assert_eq!(decoded.opcode, Opcode::Var.as_u16());
    }

    #[test]
    fn test_const_payload_widths() {
        let mut buf = Vec::new();
        push_const(&mut buf, &ExpressionValue::Float(1.5));
        assert_eq!(header_width(&buf, 0).unwrap(), 2);

        let mut buf = Vec::new();
        push_const(&mut buf, &ExpressionValue::Bool(true));
        assert_eq!(header_width(&buf, 0).unwrap(), 1);

        let mut buf = Vec::new();
        push_const(&mut buf, &ExpressionValue::Str("hello world".into()));
        assert_eq!(header_width(&buf, 0).unwrap(), 3);
        assert_eq!(
            read_const(&buf, 0).unwrap(),
            ExpressionValue::Str("hello world".into())
        );
    }

    #[test]
    fn test_unknown_opcode_is_fatal() {
        let buf = vec![0xFFFF];
        let err = read_header(&buf, 0).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, ProgramError::UnknownOpcode { opcode: 0xFFFF, index: 0 }));
    }

    #[test]
    fn test_truncated_payload() {
        let mut buf = Vec::new();
        push_const(&mut buf, &ExpressionValue::Int(7));
        buf.pop();
        assert_eq!(header_width(&buf, 0), Err(ProgramError::Truncated { index: 0 }));
    }

    #[test]
    fn test_write_float_const() {
        let mut buf = Vec::new();
        push_const(&mut buf, &ExpressionValue::Float(1.0));
        write_float_const(&mut buf, 0, 2.5).unwrap();
        assert_eq!(read_const(&buf, 0).unwrap(), ExpressionValue::Float(2.5));

        let mut buf = Vec::new();
        push_const(&mut buf, &ExpressionValue::Int(1));
        assert!(write_float_const(&mut buf, 0, 2.5).is_err());
    }
}
