pub mod avn_notice;
pub mod payment_confirmation;
pub mod payment_request;

/// Capacity of the flight number field, terminator included.
pub const FLIGHT_NUMBER_LEN: usize = 20;
/// Capacity of the airline name field, terminator included.
pub const AIRLINE_NAME_LEN: usize = 30;
/// Capacity of the aircraft type label field, terminator included.
pub const AIRCRAFT_TYPE_LEN: usize = 20;
/// Capacity of the payment status label field, terminator included.
pub const STATUS_LEN: usize = 10;

pub(crate) fn ensure_len(bytes: &[u8], expected: usize) -> Result<(), crate::errors::ProtocolError> {
    if bytes.len() < expected {
        return Err(crate::errors::ProtocolError::NotEnoughBytes {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}
