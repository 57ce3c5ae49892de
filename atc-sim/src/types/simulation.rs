use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use avn_protocol::channel::{RecordReader, RecordWriter};
use avn_protocol::errors::ProtocolError;
use avn_protocol::messages::avn_notice::AvnNotice;
use avn_protocol::messages::payment_confirmation::PaymentConfirmation;
use chrono::{NaiveDateTime, Utc};
use logger::{Color, Logger};
use threadpool::ThreadPool;

use crate::config::SimConfig;

use super::{
    airline::Airline,
    clearance::ClearanceListener,
    dispatcher::Dispatcher,
    flight::{Flight, SpeedModel},
    generator::Generator,
    radar::Radar,
    registry::FlightRegistry,
    runway::{Runway, RunwayArbiter},
    sim_error::SimError,
    timer::Timer,
    violation::{ViolationLedger, ViolationNotice},
};

/// Clock, generator, dispatcher, radar, clearance listener and display.
const WORKERS: usize = 6;

/// Read-only copy of the tower's state at one instant.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub time: NaiveDateTime,
    pub flights: Vec<Flight>,
    /// `true` meaning occupied, indexed A, B, C.
    pub runways: [bool; 3],
    pub notices: Vec<ViolationNotice>,
}

impl StatusSnapshot {
    /// Console table of the live flights and runways.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Simulated time: {}", self.time.format("%d-%m-%Y %H:%M:%S"));

        let runways: Vec<String> = Runway::ALL
            .iter()
            .zip(self.runways)
            .map(|(r, busy)| {
                format!("{} ({}) {}", r, r.usage(), if busy { "BUSY" } else { "free" })
            })
            .collect();
        let _ = writeln!(out, "Runways: {}", runways.join(" | "));

        if self.flights.is_empty() {
            let _ = writeln!(out, "No flights in the airspace.");
        } else {
            let _ = writeln!(
                out,
                "\n{:<28} {:<24} {:<12} {:<24} {:<13} {:>8} {:>4} {:<6}",
                "Flight", "Airline", "Type", "Route", "Phase", "Speed", "Pri", "Runway"
            );
            for f in &self.flights {
                let _ = writeln!(
                    out,
                    "{:<28} {:<24} {:<12} {:<24} {:<13} {:>8.1} {:>4} {:<6}{}",
                    f.flight_number,
                    f.airline.name,
                    f.aircraft_type.as_str(),
                    f.flight_type().as_str(),
                    f.phase().as_str(),
                    f.speed(),
                    f.priority(),
                    f.runway().map_or("-", |r| r.as_str()),
                    if f.has_active_violation() { "  AVN" } else { "" }
                );
            }
        }

        let unpaid = self.notices.iter().filter(|n| !n.paid).count();
        let _ = writeln!(out, "\nAVNs issued: {} ({} unpaid)", self.notices.len(), unpaid);
        out
    }
}

/// End of run summary.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalStats {
    /// Flights that entered the airspace, retired or not.
    pub total_flights: usize,
    pub retired_flights: usize,
    pub avns_issued: usize,
    pub avns_paid: usize,
    pub avns_by_airline: BTreeMap<String, usize>,
}

impl FinalStats {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Total flights processed: {}", self.total_flights);
        let _ = writeln!(out, "Flights retired: {}", self.retired_flights);
        let _ = writeln!(out, "AVNs issued: {} ({} paid)", self.avns_issued, self.avns_paid);
        for (airline, count) in &self.avns_by_airline {
            let _ = writeln!(out, "  {:<24} {}", airline, count);
        }
        out
    }
}

/// The control tower: shared state plus the loops that drive it.
pub struct Simulation {
    pub registry: Arc<FlightRegistry>,
    pub runways: Arc<RunwayArbiter>,
    pub ledger: Arc<ViolationLedger>,
    pub timer: Arc<Timer>,
    pub thread_pool: Arc<ThreadPool>,
    config: SimConfig,
    logger: Logger,
}

impl Simulation {
    /// Builds an idle tower. Simulated time starts at the current UTC time.
    pub fn new(config: SimConfig, logger: Logger) -> Result<Self, SimError> {
        let timer = Timer::scaled(
            Utc::now().naive_utc(),
            config.simulation.time_scale,
            config.simulation.clock_tick_ms,
        )?;

        Ok(Simulation {
            registry: Arc::new(FlightRegistry::new()),
            runways: Arc::new(RunwayArbiter::new()),
            ledger: Arc::new(ViolationLedger::new()),
            timer,
            thread_pool: Arc::new(ThreadPool::new(WORKERS)),
            config,
            logger,
        })
    }

    /// Populates the airspace and starts every loop.
    ///
    /// Notices go out on `outbox`; payment confirmations come back on `inbox`.
    pub fn start<W: Write + Send + 'static>(
        &self,
        outbox: RecordWriter<AvnNotice, W>,
        inbox: RecordReader<PaymentConfirmation, UnixStream>,
    ) -> Result<(), SimError> {
        inbox.set_read_timeout(Some(self.config.loops.radar()))?;

        let now = self.timer.now()?;
        let mut generator = Generator::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.runways),
            Airline::roster(),
            self.config.generator.clone(),
            self.logger.clone(),
            now,
        );
        generator.populate(now, &mut rand::thread_rng())?;

        Arc::clone(&self.timer).start(
            &self.thread_pool,
            StdDuration::from_millis(self.config.simulation.clock_tick_ms),
        );

        self.spawn_generator(generator);
        self.spawn_dispatcher();
        self.spawn_radar(outbox);
        self.spawn_clearance(inbox);
        if self.config.log.console {
            self.spawn_display();
        }

        let _ = self.logger.info(
            &format!(
                "Control tower online at {}, {} simulated s per clock tick",
                now.format("%H:%M:%S"),
                self.timer.tick_advance().num_seconds()
            ),
            Color::Green,
        );
        Ok(())
    }

    fn spawn_generator(&self, mut generator: Generator) {
        let timer = Arc::clone(&self.timer);
        let logger = self.logger.clone();
        let interval = self.config.loops.generator();

        self.thread_pool.execute(move || {
            let mut rng = rand::thread_rng();
            while timer.pace(interval) {
                let result = timer.now().and_then(|now| generator.tick(now, &mut rng));
                if let Err(e) = result {
                    let _ = logger.error(&format!("Generator tick failed: {}", e));
                }
            }
        });
    }

    fn spawn_dispatcher(&self) {
        let timer = Arc::clone(&self.timer);
        let logger = self.logger.clone();
        let interval = self.config.loops.dispatcher();
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.runways),
            SpeedModel::new(self.config.flights.overshoot_probability),
            self.config.dispatcher.retire_grace(),
            self.logger.clone(),
        );

        self.thread_pool.execute(move || {
            let mut rng = rand::thread_rng();
            while timer.pace(interval) {
                let result = timer.now().and_then(|now| dispatcher.tick(now, &mut rng));
                if let Err(e) = result {
                    let _ = logger.error(&format!("Dispatcher tick failed: {}", e));
                }
            }
        });
    }

    fn spawn_radar<W: Write + Send + 'static>(&self, outbox: RecordWriter<AvnNotice, W>) {
        let timer = Arc::clone(&self.timer);
        let logger = self.logger.clone();
        let interval = self.config.loops.radar();
        let mut radar = Radar::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.ledger),
            outbox,
            self.logger.clone(),
        );

        // Dropping the radar closes the billing channel on exit
        self.thread_pool.execute(move || {
            while timer.pace(interval) {
                let result = timer.now().and_then(|now| radar.tick(now));
                if let Err(e) = result {
                    let _ = logger.error(&format!("Radar sweep failed: {}", e));
                }
            }
        });
    }

    fn spawn_clearance(&self, inbox: RecordReader<PaymentConfirmation, UnixStream>) {
        let timer = Arc::clone(&self.timer);
        let logger = self.logger.clone();
        let mut listener = ClearanceListener::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.ledger),
            inbox,
            self.logger.clone(),
        );

        self.thread_pool.execute(move || {
            while timer.is_running() {
                match listener.poll() {
                    Ok(_) => {}
                    Err(SimError::Protocol(ProtocolError::ChannelClosed)) => {
                        let _ = logger.warn("Billing closed the confirmation channel");
                        break;
                    }
                    Err(e) => {
                        let _ = logger.error(&format!("Clearance listener failed: {}", e));
                    }
                }
            }
        });
    }

    fn spawn_display(&self) {
        let timer = Arc::clone(&self.timer);
        let registry = Arc::clone(&self.registry);
        let runways = Arc::clone(&self.runways);
        let ledger = Arc::clone(&self.ledger);
        let interval = self.config.loops.display();

        self.thread_pool.execute(move || {
            while timer.pace(interval) {
                match take_snapshot(&timer, &registry, &runways, &ledger) {
                    Ok(snapshot) => println!("{}", snapshot.render()),
                    Err(e) => eprintln!("Status display skipped: {}", e),
                }
            }
        });
    }

    /// Consistent-enough copy of the tower's state. Each part is copied under
    /// its own lock, one at a time.
    pub fn snapshot(&self) -> Result<StatusSnapshot, SimError> {
        take_snapshot(&self.timer, &self.registry, &self.runways, &self.ledger)
    }

    pub fn stats(&self) -> Result<FinalStats, SimError> {
        let retired_flights = self.registry.total_processed()?;
        let notices = self.ledger.snapshot()?;
        Ok(FinalStats {
            total_flights: retired_flights + self.registry.len()?,
            retired_flights,
            avns_issued: notices.len(),
            avns_paid: notices.iter().filter(|n| n.paid).count(),
            avns_by_airline: self.ledger.count_by_airline()?,
        })
    }

    pub fn pause(&self) {
        self.timer.pause();
    }

    pub fn resume(&self) {
        self.timer.resume();
    }

    /// Clears the running flag and waits for every loop to exit.
    pub fn stop(&self) {
        self.timer.stop();
        self.thread_pool.join();
        let _ = self.logger.info("Control tower offline", Color::Green);
    }

    /// Lets the loops run for `duration` of real time, then stops them.
    pub fn run_for(&self, duration: StdDuration) -> Result<FinalStats, SimError> {
        self.timer.pace(duration);
        self.stop();
        self.stats()
    }
}

fn take_snapshot(
    timer: &Timer,
    registry: &FlightRegistry,
    runways: &RunwayArbiter,
    ledger: &ViolationLedger,
) -> Result<StatusSnapshot, SimError> {
    Ok(StatusSnapshot {
        time: timer.now()?,
        flights: registry.snapshot()?,
        runways: runways.status()?,
        notices: ledger.snapshot()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use avn_protocol::channel::channel;
    use std::thread;

    fn fast_config(log_dir: &std::path::Path) -> SimConfig {
        let mut config = SimConfig::default();
        config.simulation.time_scale = 600.0;
        config.simulation.clock_tick_ms = 10;
        config.loops.generator_interval_ms = 10;
        config.loops.dispatcher_interval_ms = 20;
        config.loops.radar_interval_ms = 10;
        config.flights.overshoot_probability = 1.0;
        config.log.directory = log_dir.to_path_buf();
        config.log.console = false;
        config
    }

    #[test]
    fn test_run_populates_and_reports_violations() {
        let dir = tempfile::tempdir().unwrap();
        let config = fast_config(dir.path());
        let logger = Logger::new(dir.path(), "atc", false).unwrap();
        let sim = Simulation::new(config, logger).unwrap();
        let (avn_tx, mut avn_rx) = channel::<AvnNotice>().unwrap();
        let (_confirm_tx, confirm_rx) = channel::<PaymentConfirmation>().unwrap();

        let drain = thread::spawn(move || {
            let mut received = 0;
            while avn_rx.recv().is_ok() {
                received += 1;
            }
            received
        });

        sim.start(avn_tx, confirm_rx).unwrap();
        let populated = sim.snapshot().unwrap().flights.len();
        let stats = sim.run_for(StdDuration::from_millis(400)).unwrap();

        let expected: u32 = Airline::roster().iter().map(|a| a.flights_in_operation).sum();
        assert!(populated >= expected as usize);
        assert!(stats.total_flights >= expected as usize);
        assert!(stats.avns_issued > 0);
        assert_eq!(drain.join().unwrap(), stats.avns_issued);
        assert_eq!(stats.avns_by_airline.values().sum::<usize>(), stats.avns_issued);

        let snapshot = sim.snapshot().unwrap();
        assert!(snapshot.render().contains("Runways: RWY-A (North-South)"));
        assert!(snapshot.render().contains("RWY-C (Cargo/Emergency)"));
        assert!(snapshot.render().contains("Route"));
        assert!(stats.render().contains("AVNs issued"));
    }

    #[test]
    fn test_stop_joins_every_loop() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::new(dir.path(), "atc", false).unwrap();
        let sim = Simulation::new(fast_config(dir.path()), logger).unwrap();
        let (avn_tx, _avn_rx) = channel::<AvnNotice>().unwrap();
        let (_confirm_tx, confirm_rx) = channel::<PaymentConfirmation>().unwrap();

        sim.start(avn_tx, confirm_rx).unwrap();
        sim.stop();

        assert_eq!(sim.thread_pool.active_count(), 0);
        assert!(!sim.timer.is_running());
    }
}
