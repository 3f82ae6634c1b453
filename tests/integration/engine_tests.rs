//! Integration tests for the config → engine → GPIO pipeline.
//!
//! Every test drives the real `ActuationEngine` against `MockGpio` and a
//! `ScriptedClock`, so a simulated day passes in milliseconds.

use std::cell::OnceCell;
use std::rc::Rc;
use std::sync::Arc;

use embedded_hal::digital::PinState::{High, Low};

use vivarium::app::events::{EngineEvent, ShutdownSource};
use vivarium::app::service::{ActuationEngine, EngineState};
use vivarium::config::Config;
use vivarium::drivers::output::ShutdownReport;
use vivarium::error::{ConfigError, Error, HardwareError};
use vivarium::reconcile::WindowPosition;
use vivarium::safety::{ShutdownFlag, ShutdownHandle};
use vivarium::scheduler::TriggerAction;

use super::mock_hw::{at, MockGpio, MockPin, RecordingSink, ScriptedClock, Timeline};

const LIGHT_AND_FOG: &str = r#"
- name: day-light
  pin: 7
  class: light
  active: true
  start: "08:00"
  end: "20:00"
- name: fogger
  pin: 11
  class: fogging
  active: true
  hours:
    - hour: "12:00"
      elapsed_time: 5
"#;

struct Rig {
    timeline: Timeline,
    gpio: MockGpio,
    sink: Arc<RecordingSink>,
    flag: ShutdownFlag,
}

impl Rig {
    fn new(start: chrono::NaiveDateTime) -> Self {
        let timeline = Timeline::new(start);
        Self {
            gpio: MockGpio::new(timeline.clone()),
            timeline,
            sink: Arc::new(RecordingSink::new()),
            flag: ShutdownFlag::new(),
        }
    }

    fn start(
        &mut self,
        yaml: &str,
        clock: ScriptedClock,
    ) -> Result<ActuationEngine<MockPin, ScriptedClock>, Error> {
        let config = Config::from_yaml_str(yaml)?;
        self.start_with(&config, clock)
    }

    fn start_with(
        &mut self,
        config: &Config,
        clock: ScriptedClock,
    ) -> Result<ActuationEngine<MockPin, ScriptedClock>, Error> {
        ActuationEngine::start(
            config,
            &mut self.gpio,
            clock,
            self.sink.clone(),
            self.flag.clone(),
        )
    }

    fn clock(&self) -> ScriptedClock {
        ScriptedClock::new(self.timeline.clone())
    }
}

// ── Full-day scenario ─────────────────────────────────────────

#[test]
fn boot_at_nine_runs_the_day_and_shuts_down_safe() {
    let mut rig = Rig::new(at(9, 0, 0));
    let clock = rig.clock().stop_at(at(20, 0, 30), rig.flag.clone());
    let mut engine = rig.start(LIGHT_AND_FOG, clock).unwrap();

    // Boot reconciliation switched the light on immediately.
    assert_eq!(rig.gpio.level(7), Some(Low));
    assert_eq!(rig.gpio.level(11), Some(High));

    let report = engine.run();
    assert_eq!(report, Some(ShutdownReport { deactivated: 2, failed: 0 }));
    assert_eq!(engine.state(), EngineState::ShuttingDown);

    assert_eq!(
        rig.gpio.history(11),
        [
            (at(12, 0, 0), Low),
            (at(12, 0, 5), High),
            (at(20, 0, 30), High),
        ]
    );
    assert_eq!(
        rig.gpio.history(7),
        [
            (at(9, 0, 0), Low),
            (at(20, 0, 0), High),
            (at(20, 0, 30), High),
        ]
    );
    assert_eq!(rig.gpio.level(7), Some(High));
    assert_eq!(rig.gpio.level(11), Some(High));
}

#[test]
fn pins_are_claimed_inactive_before_any_write() {
    let mut rig = Rig::new(at(9, 0, 0));
    let clock = rig.clock();
    let _engine = rig.start(LIGHT_AND_FOG, clock).unwrap();
    assert_eq!(rig.gpio.claims(), [(7, High), (11, High)]);
}

#[test]
fn pulse_logs_elapsed_seconds() {
    let mut rig = Rig::new(at(11, 59, 59));
    let clock = rig.clock().stop_at(at(12, 0, 10), rig.flag.clone());
    let mut engine = rig.start(LIGHT_AND_FOG, clock).unwrap();
    engine.run();

    let events = rig.sink.events();
    assert!(events.contains(&EngineEvent::PulseStarted {
        name: "fogger".into(),
        secs: 5
    }));
    assert!(events.contains(&EngineEvent::PulseFinished {
        name: "fogger".into(),
        secs: 5,
        elapsed_secs: 5
    }));
}

#[test]
fn boot_after_window_forces_light_off() {
    let mut rig = Rig::new(at(21, 0, 0));
    let clock = rig.clock();
    let engine = rig.start(LIGHT_AND_FOG, clock).unwrap();

    assert_eq!(rig.gpio.history(7), [(at(21, 0, 0), High)]);
    assert_eq!(engine.is_active("day-light"), Some(false));
    assert!(rig.sink.events().contains(&EngineEvent::BootReconciled {
        name: "day-light".into(),
        position: WindowPosition::PastEnd,
        active: false,
    }));
    // Fogging outputs are not reconciled.
    assert!(rig.gpio.history(11).is_empty());
}

#[test]
fn same_minute_pulses_run_back_to_back_in_order() {
    let yaml = r#"
- name: mist-a
  pin: 11
  class: fogging
  active: true
  hours: [{ hour: "12:00", elapsed_time: 5 }]
- name: mist-b
  pin: 13
  class: fogging
  active: true
  hours: [{ hour: "12:00", elapsed_time: 7 }]
"#;
    let mut rig = Rig::new(at(12, 0, 0));
    let clock = rig.clock().stop_at(at(12, 0, 20), rig.flag.clone());
    let mut engine = rig.start(yaml, clock).unwrap();
    engine.run();

    let before_shutdown: Vec<_> = rig
        .gpio
        .writes()
        .into_iter()
        .filter(|w| w.at < at(12, 0, 20))
        .map(|w| (w.at, w.pin, w.level))
        .collect();
    assert_eq!(
        before_shutdown,
        [
            (at(12, 0, 0), 11, Low),
            (at(12, 0, 5), 11, High),
            (at(12, 0, 5), 13, Low),
            (at(12, 0, 12), 13, High),
        ]
    );
}

#[test]
fn light_end_during_a_long_pulse_fires_after_the_pulse() {
    let yaml = r#"
- name: day-light
  pin: 7
  class: light
  active: true
  start: "08:00"
  end: "20:00"
- name: fogger
  pin: 11
  class: fogging
  active: true
  hours: [{ hour: "19:59", elapsed_time: 120 }]
"#;
    let mut rig = Rig::new(at(19, 58, 0));
    let clock = rig.clock().stop_at(at(20, 6, 40), rig.flag.clone());
    let mut engine = rig.start(yaml, clock).unwrap();
    engine.run();

    // 20:00 passes inside the pulse; the next tick switches the light off.
    assert_eq!(
        rig.gpio.history(7),
        [
            (at(19, 58, 0), Low),
            (at(20, 1, 1), High),
            (at(20, 6, 40), High),
        ]
    );
    assert_eq!(
        rig.gpio.history(11),
        [
            (at(19, 59, 0), Low),
            (at(20, 1, 0), High),
            (at(20, 6, 40), High),
        ]
    );
    assert_eq!(
        rig.sink.count(|e| matches!(
            e,
            EngineEvent::TriggerFired { name, action: TriggerAction::Deactivate, .. }
                if name == "day-light"
        )),
        1
    );
}

// ── Shutdown ──────────────────────────────────────────────────

#[test]
fn signal_mid_pulse_deactivates_each_output_exactly_once() {
    let yaml = r#"
- name: day-light
  pin: 7
  class: light
  active: true
  start: "08:00"
  end: "20:00"
- name: fogger
  pin: 11
  class: fogging
  active: true
  hours: [{ hour: "12:00", elapsed_time: 60 }]
"#;
    let slot: Rc<OnceCell<ShutdownHandle<MockPin>>> = Rc::new(OnceCell::new());
    let hook_slot = Rc::clone(&slot);

    let mut rig = Rig::new(at(12, 0, 0));
    let clock = rig.clock().on_pulse(move |_| {
        if let Some(handle) = hook_slot.get() {
            handle.execute(ShutdownSource::Signal);
        }
    });
    let mut engine = rig.start(yaml, clock).unwrap();
    assert!(slot.set(engine.shutdown_handle()).is_ok());

    // The signal path already ran, so the loop finds nothing left to do.
    assert_eq!(engine.run(), None);

    assert_eq!(
        rig.gpio.history(11),
        [(at(12, 0, 0), Low), (at(12, 0, 30), High)]
    );
    assert_eq!(rig.gpio.history(7), [(at(12, 0, 0), Low), (at(12, 0, 30), High)]);

    // The pulse tail was refused instead of writing again.
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, EngineEvent::WriteRefused { name, active: false } if name == "fogger")),
        1
    );
    assert_eq!(
        rig.sink.count(|e| matches!(e, EngineEvent::ShutdownComplete { .. })),
        1
    );
    assert_eq!(
        rig.sink.count(|e| matches!(e, EngineEvent::PulseFinished { .. })),
        0
    );
}

#[test]
fn shutdown_requested_during_startup_stops_before_first_tick() {
    let mut rig = Rig::new(at(9, 0, 0));
    rig.flag.request();
    let clock = rig.clock();
    let mut engine = rig.start(LIGHT_AND_FOG, clock).unwrap();

    assert!(engine.run().is_some());
    assert_eq!(engine.tick_count(), 0);
    assert_eq!(rig.gpio.level(7), Some(High));
    assert_eq!(
        rig.sink.events().last(),
        Some(&EngineEvent::ShutdownComplete {
            deactivated: 2,
            failed: 0
        })
    );
}

#[test]
fn repeated_shutdown_is_a_no_op() {
    let mut rig = Rig::new(at(9, 0, 0));
    let clock = rig.clock();
    let mut engine = rig.start(LIGHT_AND_FOG, clock).unwrap();
    let handle = engine.shutdown_handle();

    assert!(handle.execute(ShutdownSource::Signal).is_some());
    let writes = rig.gpio.writes().len();
    assert!(engine.shutdown(ShutdownSource::Cooperative).is_none());
    assert!(handle.execute(ShutdownSource::Signal).is_none());
    assert_eq!(rig.gpio.writes().len(), writes);
}

#[test]
fn shutdown_survives_a_failing_output() {
    let mut rig = Rig::new(at(9, 0, 0));
    let clock = rig.clock();
    let mut engine = rig.start(LIGHT_AND_FOG, clock).unwrap();
    rig.gpio.fail_writes(7);

    let report = engine.shutdown(ShutdownSource::Signal);
    assert_eq!(report, Some(ShutdownReport { deactivated: 1, failed: 1 }));
    assert_eq!(rig.gpio.level(11), Some(High));
}

// ── Startup failures ──────────────────────────────────────────

#[test]
fn duplicate_pin_fails_before_any_claim() {
    let yaml = r#"
- name: day-light
  pin: 7
  class: light
  active: true
  start: "08:00"
  end: "20:00"
- name: night-light
  pin: 7
  class: light
  active: true
  start: "20:00"
  end: "22:00"
"#;
    let config: Config = serde_yaml::from_str::<Vec<_>>(yaml)
        .map(|outputs| Config::new(Default::default(), outputs))
        .unwrap();

    let mut rig = Rig::new(at(9, 0, 0));
    let clock = rig.clock();
    let err = rig.start_with(&config, clock).err();
    assert_eq!(
        err,
        Some(Error::Config(ConfigError::DuplicatePin {
            pin: 7,
            first: "day-light".into(),
            second: "night-light".into(),
        }))
    );
    assert!(rig.gpio.claims().is_empty());
    assert!(rig.sink.events().is_empty());
}

#[test]
fn claim_failure_aborts_without_activating_anything() {
    let mut rig = Rig::new(at(9, 0, 0));
    rig.gpio.fail_claim(11);
    let clock = rig.clock();
    let err = rig.start(LIGHT_AND_FOG, clock).err();

    assert!(matches!(
        err,
        Some(Error::Hardware(HardwareError::Claim { pin: 11, .. }))
    ));
    assert_eq!(rig.gpio.claims(), [(7, High)]);
    assert!(rig.gpio.writes().is_empty());
    assert_eq!(rig.gpio.level(7), Some(High));
}

#[test]
fn only_active_outputs_are_claimed_and_scheduled() {
    let yaml = r#"
- name: day-light
  pin: 7
  class: light
  active: true
  start: "08:00"
  end: "20:00"
- name: spare
  pin: 13
  class: light
  active: false
  start: "08:00"
  end: "20:00"
- name: fogger
  pin: 11
  class: fogging
  active: true
  hours: [{ hour: "12:00", elapsed_time: 5 }]
"#;
    let mut rig = Rig::new(at(9, 0, 0));
    let clock = rig.clock();
    let mut engine = rig.start(yaml, clock).unwrap();

    let claimed: Vec<_> = rig.gpio.claims().into_iter().map(|(pin, _)| pin).collect();
    assert_eq!(claimed, [7, 11]);
    assert_eq!(engine.output_count(), 2);
    assert_eq!(engine.registry().len(), 3);
    assert!(engine.registry().triggers().all(|t| t.name != "spare"));

    let report = engine.shutdown(ShutdownSource::Signal);
    assert_eq!(report, Some(ShutdownReport { deactivated: 2, failed: 0 }));
    assert_eq!(rig.gpio.level(13), None);
}

// ── Steady-state write failures ───────────────────────────────

#[test]
fn write_failure_is_isolated_to_its_output() {
    let yaml = r#"
- name: left
  pin: 7
  class: light
  active: true
  start: "08:00"
  end: "20:00"
- name: right
  pin: 11
  class: light
  active: true
  start: "08:00"
  end: "20:00"
"#;
    let mut rig = Rig::new(at(7, 59, 58));
    let clock = rig.clock().stop_at(at(8, 0, 5), rig.flag.clone());
    let mut engine = rig.start(yaml, clock).unwrap();
    rig.gpio.fail_writes(7);

    engine.run();

    assert_eq!(rig.gpio.level(7), Some(High), "left keeps its stale state");
    assert!(rig.gpio.history(11).contains(&(at(8, 0, 0), Low)));
    assert_eq!(
        rig.sink.count(|e| matches!(e, EngineEvent::WriteFailed { pin: 7, active: true, .. })),
        1
    );
    assert!(engine.tick_count() > 5, "loop kept ticking after the failure");
}

// ── Events ────────────────────────────────────────────────────

#[test]
fn switch_events_carry_previous_state() {
    let mut rig = Rig::new(at(7, 59, 59));
    let clock = rig.clock().stop_at(at(8, 0, 1), rig.flag.clone());
    let mut engine = rig.start(LIGHT_AND_FOG, clock).unwrap();
    engine.run();

    let switches: Vec<_> = rig
        .sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::OutputSwitched {
                name,
                previous,
                active,
                ..
            } if name == "day-light" => Some((previous, active)),
            _ => None,
        })
        .collect();
    // boot OFF, 08:00 ON, shutdown OFF
    assert_eq!(
        switches,
        [(Some(false), false), (Some(false), true), (Some(true), false)]
    );
}

#[test]
fn startup_events_follow_the_startup_order() {
    let mut rig = Rig::new(at(9, 0, 0));
    let clock = rig.clock();
    let _engine = rig.start(LIGHT_AND_FOG, clock).unwrap();

    let kinds: Vec<_> = rig
        .sink
        .events()
        .iter()
        .map(|e| match e {
            EngineEvent::OutputClaimed { .. } => "claim",
            EngineEvent::TriggerRegistered { .. } => "register",
            EngineEvent::BootReconciled { .. } => "reconcile",
            EngineEvent::OutputSwitched { .. } => "switch",
            EngineEvent::Started { .. } => "started",
            _ => "other",
        })
        .collect();
    assert_eq!(
        kinds,
        [
            "claim", "claim", "register", "register", "register", "reconcile", "switch",
            "started"
        ]
    );
}
