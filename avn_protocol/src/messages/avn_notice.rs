use std::io::Cursor;

use chrono::{DateTime, Utc};

use crate::{
    errors::ProtocolError,
    types::{Double, FixedString, FromCursorDeserializable, Int, Long},
    Record, Serializable,
};

use super::{ensure_len, AIRCRAFT_TYPE_LEN, AIRLINE_NAME_LEN, FLIGHT_NUMBER_LEN};

/// Airspace Violation Notice as sent from the control tower to the billing stage.
#[derive(Debug, Clone, PartialEq)]
pub struct AvnNotice {
    pub avn_id: Int,
    /// Numeric id of the offending flight inside the control tower.
    pub aircraft_id: Int,
    pub flight_number: String,
    pub airline_name: String,
    pub aircraft_type: String,
    pub recorded_speed: Double,
    pub allowed_speed: Double,
    pub total_fine: Double,
    /// Epoch seconds.
    pub timestamp: Long,
}

impl AvnNotice {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

impl Record for AvnNotice {
    const SIZE: usize = 4 + 4 + FLIGHT_NUMBER_LEN + AIRLINE_NAME_LEN + AIRCRAFT_TYPE_LEN + 8 * 4;
}

impl Serializable for AvnNotice {
    /// 0        4        8                28                  58                78
    /// +--------+--------+----------------+-------------------+-----------------+
    /// | avn id | acft id| flight number  |   airline name    |  aircraft type  |
    /// +--------+--------+----------------+-------------------+-----------------+
    /// | recorded speed  | allowed speed  |    total fine     |    timestamp    |
    /// +-----------------+----------------+-------------------+-----------------+
    /// 78               86               94                 102               110
    fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut bytes = Vec::with_capacity(Self::SIZE);

        bytes.extend_from_slice(&self.avn_id.to_be_bytes());
        bytes.extend_from_slice(&self.aircraft_id.to_be_bytes());
        bytes.extend_from_slice(&self.flight_number.to_fixed_bytes(FLIGHT_NUMBER_LEN)?);
        bytes.extend_from_slice(&self.airline_name.to_fixed_bytes(AIRLINE_NAME_LEN)?);
        bytes.extend_from_slice(&self.aircraft_type.to_fixed_bytes(AIRCRAFT_TYPE_LEN)?);
        bytes.extend_from_slice(&self.recorded_speed.to_be_bytes());
        bytes.extend_from_slice(&self.allowed_speed.to_be_bytes());
        bytes.extend_from_slice(&self.total_fine.to_be_bytes());
        bytes.extend_from_slice(&self.timestamp.to_be_bytes());

        Ok(bytes)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(bytes, Self::SIZE)?;
        let mut cursor = Cursor::new(bytes);

        Ok(Self {
            avn_id: Int::deserialize(&mut cursor)?,
            aircraft_id: Int::deserialize(&mut cursor)?,
            flight_number: String::from_fixed_bytes(&mut cursor, FLIGHT_NUMBER_LEN)?,
            airline_name: String::from_fixed_bytes(&mut cursor, AIRLINE_NAME_LEN)?,
            aircraft_type: String::from_fixed_bytes(&mut cursor, AIRCRAFT_TYPE_LEN)?,
            recorded_speed: Double::deserialize(&mut cursor)?,
            allowed_speed: Double::deserialize(&mut cursor)?,
            total_fine: Double::deserialize(&mut cursor)?,
            timestamp: Long::deserialize(&mut cursor)?,
        })
    }
}
