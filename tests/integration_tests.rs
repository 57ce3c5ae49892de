use std::path::Path;
use std::time::Duration;

use air_control_x::atc_sim::types::runway::Runway;
use air_control_x::atc_sim::types::violation::{ViolationKind, NO_SPEED_LIMIT};
use air_control_x::atc_sim::{SimConfig, Simulation};
use air_control_x::avn_protocol::channel::channel;
use air_control_x::avn_protocol::messages::avn_notice::AvnNotice;
use air_control_x::avn_protocol::messages::payment_confirmation::PaymentConfirmation;
use air_control_x::billing::BillingPipeline;
use air_control_x::logger::Logger;

// Ten simulated minutes per real second, every loop polling fast
fn fast_config(log_dir: &Path, overshoot_probability: f64) -> SimConfig {
    let mut config = SimConfig::default();
    config.simulation.time_scale = 600.0;
    config.simulation.clock_tick_ms = 10;
    config.loops.generator_interval_ms = 10;
    config.loops.dispatcher_interval_ms = 20;
    config.loops.radar_interval_ms = 10;
    config.flights.overshoot_probability = overshoot_probability;
    config.dispatcher.retire_grace_secs = 60;
    config.log.directory = log_dir.to_path_buf();
    config.log.console = false;
    config
}

fn run_tower(
    config: SimConfig,
    run_time: Duration,
) -> (
    air_control_x::atc_sim::FinalStats,
    air_control_x::billing::PipelineSummary,
    Simulation,
) {
    let log_dir = config.log.directory.clone();
    let logger = Logger::new(&log_dir, "atc", false).expect("Failed to create logger");

    let (to_billing, from_core) = channel::<AvnNotice>().unwrap();
    let (to_core, from_billing) = channel::<PaymentConfirmation>().unwrap();
    let billing = BillingPipeline::spawn(&log_dir, false, from_core, to_core).unwrap();

    let sim = Simulation::new(config, logger).unwrap();
    sim.start(to_billing, from_billing).unwrap();
    let stats = sim.run_for(run_time).unwrap();
    let summary = billing.join().unwrap();

    (stats, summary, sim)
}

#[test]
fn test_violations_travel_through_billing_and_back() {
    let dir = tempfile::tempdir().unwrap();

    let (stats, summary, sim) = run_tower(fast_config(dir.path(), 1.0), Duration::from_millis(600));

    assert!(stats.avns_issued > 0, "every transition overshoots, notices expected");
    assert_eq!(summary.billed, stats.avns_issued);
    assert_eq!(summary.payments_submitted, summary.billed);
    assert_eq!(summary.payments_approved, summary.billed);
    assert!(stats.avns_paid > 0, "confirmations should reach the tower");
    assert!(stats.avns_paid <= summary.confirmations_relayed);

    // A paid notice always closes its episode on a live flight
    let notices = sim.ledger.snapshot().unwrap();
    for flight in sim.registry.snapshot().unwrap() {
        let open = notices
            .iter()
            .filter(|n| n.flight_id == flight.id && !n.paid)
            .count();
        assert!(open <= 1, "flight {} has {} open notices", flight.id, open);
        if flight.has_active_violation() {
            assert_eq!(open, 1);
        }
    }

    let atc_log = std::fs::read_to_string(dir.path().join("atc.log")).unwrap();
    assert!(atc_log.contains("AVN #1 issued"));
    assert!(dir.path().join("airline_portal.log").exists());
}

#[test]
fn test_compliant_speeds_raise_only_approach_notices() {
    let dir = tempfile::tempdir().unwrap();

    let (stats, summary, sim) = run_tower(fast_config(dir.path(), 0.0), Duration::from_millis(600));

    // Without overshoot the only rule left to break is the northern cargo approach
    let notices = sim.ledger.snapshot().unwrap();
    assert!(notices
        .iter()
        .all(|n| n.kind == ViolationKind::RestrictedApproach && n.allowed_speed == NO_SPEED_LIMIT));
    assert_eq!(summary.billed, stats.avns_issued);
    assert!(stats.retired_flights > 0, "flights should finish and retire");
    assert_eq!(
        stats.total_flights,
        stats.retired_flights + sim.registry.len().unwrap()
    );

    // Runways held only by live flights in a runway phase, one flight each
    let snapshot = sim.snapshot().unwrap();
    let mut held: Vec<Runway> = snapshot.flights.iter().filter_map(|f| f.runway()).collect();
    let holders = held.len();
    held.sort_by_key(|r| r.as_str());
    held.dedup();
    assert_eq!(held.len(), holders, "a runway is held by two flights");
    let occupied: Vec<Runway> = Runway::ALL
        .into_iter()
        .zip(snapshot.runways)
        .filter_map(|(runway, busy)| busy.then_some(runway))
        .collect();
    assert_eq!(held, occupied);
}

#[test]
fn test_flight_number_survives_the_wire() {
    let (mut tx, mut rx) = channel::<AvnNotice>().unwrap();
    let notice = AvnNotice {
        avn_id: 1,
        aircraft_id: 3,
        flight_number: "PIA-101".to_string(),
        airline_name: "PIA".to_string(),
        aircraft_type: "Commercial".to_string(),
        recorded_speed: 650.0,
        allowed_speed: 600.0,
        total_fine: 575_000.0,
        timestamp: 1_700_000_000,
    };

    tx.send(&notice).unwrap();

    assert_eq!(rx.recv().unwrap(), notice);
}
