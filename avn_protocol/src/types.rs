use std::io::{Cursor, Read};

use crate::errors::ProtocolError;

/// A 4 bytes signed integer.
pub type Int = i32;
/// An 8 bytes signed integer.
pub type Long = i64;
/// An 8 bytes IEEE 754 float.
pub type Double = f64;

pub trait FromCursorDeserializable {
    fn deserialize(cursor: &mut Cursor<&[u8]>) -> Result<Self, ProtocolError>
    where
        Self: Sized;
}

impl FromCursorDeserializable for Int {
    fn deserialize(cursor: &mut Cursor<&[u8]>) -> Result<Self, ProtocolError> {
        let mut bytes = [0u8; 4];
        cursor
            .read_exact(&mut bytes)
            .map_err(|_| ProtocolError::CursorError)?;

        Ok(Int::from_be_bytes(bytes))
    }
}

impl FromCursorDeserializable for Long {
    fn deserialize(cursor: &mut Cursor<&[u8]>) -> Result<Self, ProtocolError> {
        let mut bytes = [0u8; 8];
        cursor
            .read_exact(&mut bytes)
            .map_err(|_| ProtocolError::CursorError)?;

        Ok(Long::from_be_bytes(bytes))
    }
}

impl FromCursorDeserializable for Double {
    fn deserialize(cursor: &mut Cursor<&[u8]>) -> Result<Self, ProtocolError> {
        let mut bytes = [0u8; 8];
        cursor
            .read_exact(&mut bytes)
            .map_err(|_| ProtocolError::CursorError)?;

        Ok(Double::from_be_bytes(bytes))
    }
}

/// Fixed-capacity string fields.
///
/// The sender right-truncates to `capacity - 1` bytes (never splitting a
/// character) and pads with NUL, so the field always holds a terminator.
/// The receiver stops at the first NUL and decodes lossily.
pub trait FixedString {
    fn from_fixed_bytes(
        cursor: &mut Cursor<&[u8]>,
        capacity: usize,
    ) -> std::result::Result<Self, ProtocolError>
    where
        Self: Sized;

    fn to_fixed_bytes(&self, capacity: usize) -> std::result::Result<Vec<u8>, ProtocolError>;
}

impl FixedString for String {
    fn from_fixed_bytes(
        cursor: &mut Cursor<&[u8]>,
        capacity: usize,
    ) -> std::result::Result<Self, ProtocolError> {
        let mut field = vec![0u8; capacity];
        cursor
            .read_exact(&mut field)
            .map_err(|_| ProtocolError::CursorError)?;

        let end = field.iter().position(|b| *b == 0).unwrap_or(capacity);

        Ok(String::from_utf8_lossy(&field[..end]).into_owned())
    }

    fn to_fixed_bytes(&self, capacity: usize) -> std::result::Result<Vec<u8>, ProtocolError> {
        if capacity == 0 {
            return Err(ProtocolError::SerializationError(
                "fixed string field needs room for a terminator".to_string(),
            ));
        }

        let mut len = self.len().min(capacity - 1);
        while !self.is_char_boundary(len) {
            len -= 1;
        }

        let mut bytes = vec![0u8; capacity];
        bytes[..len].copy_from_slice(&self.as_bytes()[..len]);

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_string_short_value_is_padded() {
        let bytes = "PIA".to_string().to_fixed_bytes(6).unwrap();

        assert_eq!(bytes, vec![b'P', b'I', b'A', 0, 0, 0]);
    }

    #[test]
    fn test_fixed_string_long_value_keeps_terminator() {
        let bytes = "AghaKhan Air Ambulance".to_string().to_fixed_bytes(10).unwrap();

        assert_eq!(bytes.len(), 10);
        assert_eq!(&bytes[..9], b"AghaKhan ");
        assert_eq!(bytes[9], 0);
    }

    #[test]
    fn test_fixed_string_truncation_respects_char_boundary() {
        // 'ü' is two bytes, cutting at 4 would split it
        let bytes = "Zürich".to_string().to_fixed_bytes(4).unwrap();

        assert_eq!(bytes, vec![b'Z', 0, 0, 0]);
    }

    #[test]
    fn test_fixed_string_reader_stops_at_first_nul() {
        let input = [b'A', b'B', 0, b'X', b'Y'];
        let mut cursor = Cursor::new(input.as_slice());

        let value = String::from_fixed_bytes(&mut cursor, 5).unwrap();

        assert_eq!(value, "AB");
        assert_eq!(cursor.position(), 5);
    }

    #[test]
    fn test_fixed_string_reader_tolerates_missing_terminator() {
        let input = *b"FedEx";
        let mut cursor = Cursor::new(input.as_slice());

        let value = String::from_fixed_bytes(&mut cursor, 5).unwrap();

        assert_eq!(value, "FedEx");
    }

    #[test]
    fn test_fixed_string_zero_capacity_is_rejected() {
        assert!("x".to_string().to_fixed_bytes(0).is_err());
    }

    #[test]
    fn test_int_from_cursor_not_enough_bytes() {
        let input = [0x00, 0x01];
        let mut cursor = Cursor::new(input.as_slice());

        assert!(matches!(
            Int::deserialize(&mut cursor),
            Err(ProtocolError::CursorError)
        ));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn fixed_field_is_terminated_and_a_prefix(value in "\\PC{0,40}", capacity in 1usize..32) {
                let bytes = value.to_fixed_bytes(capacity).unwrap();
                prop_assert_eq!(bytes.len(), capacity);
                prop_assert_eq!(bytes[capacity - 1], 0);

                let mut cursor = Cursor::new(bytes.as_slice());
                let decoded = String::from_fixed_bytes(&mut cursor, capacity).unwrap();
                prop_assert!(value.starts_with(&decoded));
            }
        }
    }
}
