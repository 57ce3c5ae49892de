use std::io::Cursor;

use crate::{
    errors::ProtocolError,
    types::{Double, FixedString, FromCursorDeserializable, Int},
    Record, Serializable,
};

use super::{ensure_len, AIRCRAFT_TYPE_LEN};

/// Sent by the airline portal to the payment processor to settle a notice.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub avn_id: Int,
    pub aircraft_id: Int,
    pub aircraft_type: String,
    pub total_fine: Double,
}

impl Record for PaymentRequest {
    const SIZE: usize = 4 + 4 + AIRCRAFT_TYPE_LEN + 8;
}

impl Serializable for PaymentRequest {
    fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut bytes = Vec::with_capacity(Self::SIZE);

        bytes.extend_from_slice(&self.avn_id.to_be_bytes());
        bytes.extend_from_slice(&self.aircraft_id.to_be_bytes());
        bytes.extend_from_slice(&self.aircraft_type.to_fixed_bytes(AIRCRAFT_TYPE_LEN)?);
        bytes.extend_from_slice(&self.total_fine.to_be_bytes());

        Ok(bytes)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(bytes, Self::SIZE)?;
        let mut cursor = Cursor::new(bytes);

        Ok(Self {
            avn_id: Int::deserialize(&mut cursor)?,
            aircraft_id: Int::deserialize(&mut cursor)?,
            aircraft_type: String::from_fixed_bytes(&mut cursor, AIRCRAFT_TYPE_LEN)?,
            total_fine: Double::deserialize(&mut cursor)?,
        })
    }
}
