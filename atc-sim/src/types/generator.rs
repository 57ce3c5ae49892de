use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use logger::{Color, Logger};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::GeneratorSettings;

use super::{
    aircraft::{AircraftType, Direction},
    airline::Airline,
    flight::{Flight, SpeedModel},
    flight_phase::FlightPhase,
    registry::FlightRegistry,
    runway::{Runway, RunwayArbiter},
    sim_error::SimError,
};

/// A flight the generator created.
#[derive(Debug, Clone, PartialEq)]
pub struct Spawned {
    pub flight_id: u32,
    pub flight_number: String,
    pub direction: Direction,
    pub is_emergency: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GeneratorReport {
    pub spawned: Vec<Spawned>,
    /// Cargo spawns dropped because runway C was busy: direction and airline.
    pub skipped: Vec<(Direction, String)>,
    /// Flights escalated to emergency status this tick.
    pub escalated: Vec<u32>,
}

/// Creates new flights on per-direction cadences and escalates existing ones
/// to emergencies.
pub struct Generator {
    registry: Arc<FlightRegistry>,
    runways: Arc<RunwayArbiter>,
    airlines: Vec<Arc<Airline>>,
    settings: GeneratorSettings,
    logger: Logger,
    next_spawn: HashMap<Direction, NaiveDateTime>,
    next_escalation: NaiveDateTime,
    created: u32,
}

impl Generator {
    /// The first spawn in each direction fires one cadence after `now`.
    pub fn new(
        registry: Arc<FlightRegistry>,
        runways: Arc<RunwayArbiter>,
        airlines: Vec<Arc<Airline>>,
        settings: GeneratorSettings,
        logger: Logger,
        now: NaiveDateTime,
    ) -> Self {
        let next_spawn = Direction::ALL
            .iter()
            .map(|&d| (d, now + settings.cadence(d)))
            .collect();
        let next_escalation = now + settings.escalation_interval();

        Generator {
            registry,
            runways,
            airlines,
            settings,
            logger,
            next_spawn,
            next_escalation,
            created: 0,
        }
    }

    /// Puts every airline's in-operation fleet in the air, numbered from 100.
    pub fn populate<R: Rng>(&mut self, now: NaiveDateTime, rng: &mut R) -> Result<Vec<Spawned>, SimError> {
        let mut spawned = Vec::new();
        for airline in self.airlines.clone() {
            for i in 0..airline.flights_in_operation {
                let direction = Direction::ALL[rng.gen_range(0..Direction::ALL.len())];
                let number = format!("{}-{}", airline.name, 100 + i);
                spawned.push(self.create(&airline, direction, number, now, rng)?);
            }
        }

        let _ = self.logger.info(
            &format!("Initial population: {} flights", spawned.len()),
            Color::Green,
        );
        Ok(spawned)
    }

    /// Fires every direction whose next spawn time has passed, then runs an
    /// escalation round if one is due.
    ///
    /// Next fire times count from `now`, so a late tick fires each direction
    /// once instead of catching up on missed cadences.
    pub fn tick<R: Rng>(&mut self, now: NaiveDateTime, rng: &mut R) -> Result<GeneratorReport, SimError> {
        let mut report = GeneratorReport::default();

        for direction in Direction::ALL {
            let due = self.next_spawn.get(&direction).copied().unwrap_or(now);
            if now < due {
                continue;
            }
            self.next_spawn
                .insert(direction, now + self.settings.cadence(direction));

            let Some(airline) = self.airlines.choose(rng).cloned() else {
                continue;
            };

            if airline.aircraft_type == AircraftType::Cargo
                && !self.runways.is_available(Runway::C)?
            {
                let _ = self.logger.info(
                    &format!(
                        "{} cargo flight from the {} held back: {} is busy",
                        airline.name,
                        direction,
                        Runway::C
                    ),
                    Color::Yellow,
                );
                report.skipped.push((direction, airline.name.clone()));
                continue;
            }

            let number = format!("{}-{}", airline.name, 200 + self.created);
            report
                .spawned
                .push(self.create(&airline, direction, number, now, rng)?);
        }

        if now >= self.next_escalation {
            self.next_escalation = now + self.settings.escalation_interval();
            report.escalated = self.escalate(rng)?;
        }

        Ok(report)
    }

    fn create<R: Rng>(
        &mut self,
        airline: &Arc<Airline>,
        direction: Direction,
        flight_number: String,
        now: NaiveDateTime,
        rng: &mut R,
    ) -> Result<Spawned, SimError> {
        let is_emergency = rng.gen_bool(self.settings.emergency_probability.get(direction));
        let speed = SpeedModel::compliant().sample(FlightPhase::entry(direction), rng);

        let flight_id = self.registry.spawn(|id| {
            Flight::new(
                id,
                &flight_number,
                Arc::clone(airline),
                direction,
                is_emergency,
                speed,
                now,
            )
        })?;
        self.created += 1;

        let _ = self.logger.info(
            &format!(
                "New flight {} ({}, {}) from the {}{}",
                flight_number,
                airline.name,
                airline.aircraft_type,
                direction,
                if is_emergency { ", EMERGENCY" } else { "" }
            ),
            Color::Green,
        );

        Ok(Spawned {
            flight_id,
            flight_number,
            direction,
            is_emergency,
        })
    }

    /// Rolls each non-emergency flight once against its direction's
    /// escalation probability.
    fn escalate<R: Rng>(&self, rng: &mut R) -> Result<Vec<u32>, SimError> {
        let probabilities = self.settings.escalation_probability;
        let escalated = self.registry.with_flights(|flights| {
            flights
                .iter_mut()
                .filter(|f| !f.is_emergency())
                .filter_map(|f| {
                    if rng.gen_bool(probabilities.get(f.direction)) && f.declare_emergency() {
                        Some(f.id)
                    } else {
                        None
                    }
                })
                .collect::<Vec<u32>>()
        })?;

        for id in &escalated {
            let _ = self
                .logger
                .warn(&format!("Flight {} declared an emergency", id));
        }
        Ok(escalated)
    }
}
