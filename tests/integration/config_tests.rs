//! Integration tests for loading configuration files from disk and
//! running the engine against real file-backed adapters.

use std::fs;
use std::sync::Arc;

use embedded_hal::digital::PinState;

use vivarium::adapters::log_sink::LogEventSink;
use vivarium::adapters::sim_gpio::SimGpio;
use vivarium::adapters::sysfs_gpio::SysfsGpio;
use vivarium::app::events::ShutdownSource;
use vivarium::app::service::ActuationEngine;
use vivarium::config::{Config, Polarity, Schedule};
use vivarium::error::ConfigError;
use vivarium::pins::PinNumbering;
use vivarium::safety::ShutdownFlag;

use super::mock_hw::{at, ScriptedClock, Timeline};

const BARE_LIST: &str = r#"
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

#[test]
fn loads_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, BARE_LIST).unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.outputs.len(), 2);
    assert_eq!(config.engine.polarity, Polarity::ActiveLow);
    assert!(matches!(config.outputs[1].schedule, Schedule::Fogging(_)));
}

#[test]
fn loads_json_file_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outputs.JSON");
    fs::write(
        &path,
        r#"{"engine":{"catch_up_secs":120},
            "outputs":[{"name":"lamp","pin":7,"class":"light","active":true,
                        "start":"06:30","end":"21:00"}]}"#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.engine.catch_up_secs, 120);
    assert_eq!(config.outputs[0].name, "lamp");
}

#[test]
fn yaml_content_in_json_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, BARE_LIST).unwrap();
    assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
}

#[test]
fn missing_file_is_distinguished_from_bad_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");
    assert_eq!(Config::load(&path), Err(ConfigError::Missing(path.clone())));

    fs::write(&path, "outputs: [").unwrap();
    assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
}

#[test]
fn active_high_polarity_inverts_the_board() {
    let yaml = r#"
engine: { polarity: active_high }
outputs:
  - { name: lamp, pin: 7, class: light, active: true, start: "08:00", end: "20:00" }
"#;
    let config = Config::from_yaml_str(yaml).unwrap();
    let mut gpio = SimGpio::new();
    let timeline = Timeline::new(at(10, 0, 0));
    let mut engine = ActuationEngine::start(
        &config,
        &mut gpio,
        ScriptedClock::new(timeline),
        Arc::new(LogEventSink::new()),
        ShutdownFlag::new(),
    )
    .unwrap();

    assert_eq!(gpio.writes(), [(7, PinState::High)]);
    engine.shutdown(ShutdownSource::Signal);
    assert_eq!(gpio.level(7), Some(PinState::Low));
}

#[test]
fn engine_drives_a_sysfs_tree() {
    let tree = tempfile::tempdir().unwrap();
    fs::write(tree.path().join("export"), "").unwrap();
    fs::create_dir(tree.path().join("gpio4")).unwrap();
    fs::write(tree.path().join("gpio4/direction"), "in").unwrap();
    fs::write(tree.path().join("gpio4/value"), "1").unwrap();

    let yaml = format!(
        r#"
engine:
  numbering: bcm
  gpio_root: "{}"
outputs:
  - {{ name: lamp, pin: 4, class: light, active: true, start: "08:00", end: "20:00" }}
"#,
        tree.path().display()
    );
    let config = Config::from_yaml_str(&yaml).unwrap();
    assert_eq!(config.engine.numbering, PinNumbering::Bcm);

    let mut gpio = SysfsGpio::new(&config.engine.gpio_root, config.engine.numbering);
    let mut engine = ActuationEngine::start(
        &config,
        &mut gpio,
        ScriptedClock::new(Timeline::new(at(9, 0, 0))),
        Arc::new(LogEventSink::new()),
        ShutdownFlag::new(),
    )
    .unwrap();

    let read = |file: &str| fs::read_to_string(tree.path().join("gpio4").join(file)).unwrap();
    assert_eq!(read("direction"), "high");
    assert_eq!(read("value"), "0");
    assert_eq!(engine.is_active("lamp"), Some(true));

    engine.shutdown(ShutdownSource::Signal);
    assert_eq!(read("value"), "1");
}
