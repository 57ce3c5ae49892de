pub mod aircraft;

pub mod airline;

pub mod flight_phase;

pub mod flight;

pub mod runway;

pub mod registry;

pub mod violation;

pub mod sim_error;

pub mod timer;

pub mod dispatcher;

pub mod generator;

pub mod radar;

pub mod clearance;

pub mod simulation;

#[cfg(test)]
pub(crate) mod test_support;
