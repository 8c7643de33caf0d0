//! Mode machine behavior across a realistic outage and concurrent reporting.

use cf_components::{Gate, GateCatalog};
use cf_controls::{
    ControlMode, ModeMachine, ModeMachineConfig, Severity, TransitionCause, TransitionEvent,
};
use cf_core::units::m;
use chrono::{Duration, TimeZone, Utc};

fn catalog() -> GateCatalog {
    GateCatalog::new([
        Gate::new("G-12", "head", "lateral", m(2.5), m(1.8)),
        Gate::new("G-40", "lateral", "farm", m(1.5), m(1.2)).with_fallback(false),
    ])
    .unwrap()
}

#[test]
fn outage_fallback_and_operator_recovery() {
    let t0 = Utc.with_ymd_and_hms(2026, 4, 1, 6, 0, 0).unwrap();
    let mm = ModeMachine::new(&catalog(), ModeMachineConfig::default(), t0).unwrap();
    mm.record_command("G-12", 0.9).unwrap();
    mm.record_confirmed_opening("G-12", 0.9).unwrap();

    let tick = |n: i64| t0 + Duration::minutes(n);
    let mut events = Vec::new();
    for n in 1..=3 {
        events.extend(mm.report_communication("G-12", false, tick(n)).unwrap());
    }
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].severity, Severity::Warning);
    assert_eq!(mm.get_mode("G-12").unwrap(), ControlMode::Manual);

    // More failures while MANUAL only count.
    assert!(mm.report_communication("G-12", false, tick(4)).unwrap().is_none());
    assert_eq!(mm.state("G-12").unwrap().consecutive_failures, 4);

    // Restored contact alone does not resume automatic control.
    assert!(mm.report_communication("G-12", true, tick(5)).unwrap().is_none());
    assert_eq!(mm.get_mode("G-12").unwrap(), ControlMode::Manual);

    let state = mm.state("G-12").unwrap();
    assert_eq!(state.consecutive_failures, 0);
    assert_eq!(state.commanded_opening, Some(0.9));
    assert_eq!(state.confirmed_opening, Some(0.9));

    mm.confirm_automatic("G-12", "shift-lead", tick(6)).unwrap();
    assert_eq!(mm.get_mode("G-12").unwrap(), ControlMode::Automatic);
    assert_eq!(mm.log().for_gate("G-12").len(), 2);
}

#[test]
fn failed_gate_needs_field_clearance() {
    let t0 = Utc.with_ymd_and_hms(2026, 4, 1, 6, 0, 0).unwrap();
    let mm = ModeMachine::new(&catalog(), ModeMachineConfig::default(), t0).unwrap();

    for n in 1..=3 {
        mm.report_communication("G-40", false, t0 + Duration::minutes(n))
            .unwrap();
    }
    assert_eq!(mm.get_mode("G-40").unwrap(), ControlMode::Failed);
    assert_eq!(mm.log().snapshot()[0].severity, Severity::Critical);

    mm.report_communication("G-40", true, t0 + Duration::minutes(4))
        .unwrap();
    assert!(mm
        .confirm_automatic("G-40", "ops", t0 + Duration::minutes(5))
        .is_err());
    assert_eq!(mm.get_mode("G-40").unwrap(), ControlMode::Failed);

    let ev = mm
        .clear_failure("G-40", "actuator replaced", t0 + Duration::minutes(30))
        .unwrap();
    assert_eq!(ev.to, ControlMode::Manual);
    assert!(matches!(ev.cause, TransitionCause::FieldClearance { .. }));
    assert!(mm
        .clear_failure("G-40", "again", t0 + Duration::minutes(31))
        .is_err());
}

#[test]
fn concurrent_failures_transition_once() {
    let t0 = Utc::now();
    let mm = ModeMachine::new(&catalog(), ModeMachineConfig::default(), t0).unwrap();

    let transitions: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let mm = &mm;
                scope.spawn(move || {
                    let mut seen = 0;
                    for _ in 0..5 {
                        if mm
                            .report_communication("G-12", false, Utc::now())
                            .unwrap()
                            .is_some()
                        {
                            seen += 1;
                        }
                    }
                    seen
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(transitions, 1);
    assert_eq!(mm.log().len(), 1);
    assert_eq!(mm.state("G-12").unwrap().consecutive_failures, 40);
}

#[test]
fn transition_log_serializes() {
    let t0 = Utc.with_ymd_and_hms(2026, 4, 1, 6, 0, 0).unwrap();
    let mm = ModeMachine::new(&catalog(), ModeMachineConfig::default(), t0).unwrap();
    for n in 1..=3 {
        mm.report_communication("G-12", false, t0 + Duration::minutes(n))
            .unwrap();
    }

    let json = serde_json::to_string(&mm.log().snapshot()).unwrap();
    assert!(json.contains("\"from\":\"AUTOMATIC\""));
    assert!(json.contains("\"to\":\"MANUAL\""));
    assert!(json.contains("communication_loss"));

    let back: Vec<TransitionEvent> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, mm.log().snapshot());
}

#[test]
fn config_defaults_from_empty_document() {
    let cfg: ModeMachineConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(cfg.failure_threshold, 3);
}
