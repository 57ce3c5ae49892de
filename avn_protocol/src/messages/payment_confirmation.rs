use std::io::Cursor;

use crate::{
    errors::ProtocolError,
    types::{FixedString, FromCursorDeserializable, Int},
    Record, Serializable,
};

use super::{ensure_len, STATUS_LEN};

pub const STATUS_PAID: &str = "paid";
pub const STATUS_DECLINED: &str = "declined";

/// Issued by the payment processor once a notice has been settled.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentConfirmation {
    pub avn_id: Int,
    pub status: String,
}

impl PaymentConfirmation {
    pub fn paid(avn_id: Int) -> Self {
        Self {
            avn_id,
            status: STATUS_PAID.to_string(),
        }
    }

    pub fn declined(avn_id: Int) -> Self {
        Self {
            avn_id,
            status: STATUS_DECLINED.to_string(),
        }
    }

    /// The label is not validated by the sender, compare loosely.
    pub fn is_paid(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case(STATUS_PAID)
    }
}

impl Record for PaymentConfirmation {
    const SIZE: usize = 4 + STATUS_LEN;
}

impl Serializable for PaymentConfirmation {
    fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut bytes = Vec::with_capacity(Self::SIZE);

        bytes.extend_from_slice(&self.avn_id.to_be_bytes());
        bytes.extend_from_slice(&self.status.to_fixed_bytes(STATUS_LEN)?);

        Ok(bytes)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(bytes, Self::SIZE)?;
        let mut cursor = Cursor::new(bytes);

        Ok(Self {
            avn_id: Int::deserialize(&mut cursor)?,
            status: String::from_fixed_bytes(&mut cursor, STATUS_LEN)?,
        })
    }
}
