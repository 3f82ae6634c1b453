//! Fuzz target: configuration parser
//!
//! Feeds arbitrary text to the YAML and JSON loaders and verifies:
//! - No panics on malformed documents or time strings
//! - Any accepted config satisfies the invariants the engine relies on:
//!   unique pins, non-empty output list, non-zero pulse durations
//! - Accepted time-of-day values round-trip through `HH:MM`
//!
//! cargo fuzz run fuzz_config_parse

#![no_main]

use std::collections::HashSet;

use libfuzzer_sys::fuzz_target;
use vivarium::config::{Config, Schedule, TimeOfDay};

fn check(config: &Config) {
    assert!(!config.outputs.is_empty(), "accepted an empty output list");

    let mut pins = HashSet::new();
    for output in &config.outputs {
        assert!(pins.insert(output.pin), "accepted duplicate pin {}", output.pin);
        match &output.schedule {
            Schedule::Light(light) => {
                for t in [light.start, light.end] {
                    assert_eq!(TimeOfDay::parse(&t.to_string()), Ok(t));
                }
            }
            Schedule::Fogging(fog) => {
                for pulse in &fog.pulses {
                    assert!(pulse.duration_secs > 0, "accepted a zero-length pulse");
                }
            }
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };

    // Time strings on their own: strict HH:MM only.
    if let Ok(t) = TimeOfDay::parse(text) {
        assert_eq!(text.len(), 5);
        assert_eq!(t.to_string(), text);
    }

    if let Ok(config) = Config::from_yaml_str(text) {
        check(&config);
    }
    if let Ok(config) = Config::from_json_str(text) {
        check(&config);
    }
});
