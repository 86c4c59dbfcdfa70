//! TOML schema parsing and validation.

use irrigator_config::load_toml;
use rstest::rstest;

const GOOD: &str = r#"
[scheduler]
tick_ms = 250

[logging]
level = "debug"

[[channels]]
id = "basil"
plant_name = "Basil"
min_moisture_target = 65.0
max_moisture_target = 78.0
pump_dose_ms = 2500
max_doses_per_cycle = 4

[channels.calibration]
counts_dry = 3000
counts_wet = 1400

[[channels]]
id = "mint"
"#;

#[test]
fn full_config_parses_and_validates() {
    let cfg = load_toml(GOOD).unwrap();
    cfg.validate().unwrap();

    assert_eq!(cfg.scheduler.tick_ms, 250);
    assert_eq!(cfg.logging.level.as_deref(), Some("debug"));
    assert_eq!(cfg.channels.len(), 2);

    let basil = &cfg.channels[0];
    assert_eq!(basil.plant_name.as_deref(), Some("Basil"));
    assert_eq!(basil.pump_dose_ms, 2_500);
    assert_eq!(basil.calibration.counts_dry, 3_000);
    assert_eq!(basil.calibration.valid_max, 4_095); // default kept
}

#[test]
fn minimal_channel_gets_defaults() {
    let cfg = load_toml(GOOD).unwrap();
    let mint = &cfg.channels[1];
    assert!(mint.enabled);
    assert_eq!(mint.min_moisture_target, 70.0);
    assert_eq!(mint.max_moisture_target, 80.0);
    assert_eq!(mint.pump_dose_ms, 3_000);
    assert_eq!(mint.between_doses_ms, 900_000);
    assert_eq!(mint.max_doses_per_cycle, 6);
    assert_eq!(mint.smoothing.dosing_sigma_s, 300.0);
    assert!(mint.reservoir.interlock);
}

#[test]
fn missing_channels_is_rejected() {
    let cfg = load_toml("[scheduler]\ntick_ms = 100\nchannels = []\n").unwrap();
    assert!(cfg.validate().is_err());
}

#[rstest]
#[case("min_moisture_target = 85.0", "targets")] // min above default max
#[case("max_moisture_target = 101.0", "targets")]
#[case("pump_dose_ms = 0", "pump_dose_ms")]
#[case("pump_dose_ms = 120000", "pump_dose_ms")]
#[case("max_doses_per_cycle = 0", "max_doses_per_cycle")]
fn bad_channel_values_fail_validation(#[case] line: &str, #[case] what: &str) {
    let toml = format!("[[channels]]\nid = \"ch\"\n{line}\n");
    let cfg = load_toml(&toml).unwrap();
    let err = cfg.validate().unwrap_err();
    assert!(
        err.to_string().contains(what)
            || err.to_string().contains("targets must satisfy"),
        "unexpected error: {err}"
    );
}

#[test]
fn duplicate_channel_ids_fail_validation() {
    let toml = "[[channels]]\nid = \"ch\"\n\n[[channels]]\nid = \"ch\"\n";
    let cfg = load_toml(toml).unwrap();
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn equal_calibration_points_fail_validation() {
    let toml = "[[channels]]\nid = \"ch\"\n[channels.calibration]\ncounts_dry = 2000\ncounts_wet = 2000\n";
    let cfg = load_toml(toml).unwrap();
    assert!(cfg.validate().is_err());
}

#[test]
fn zero_tick_fails_validation() {
    let toml = "[scheduler]\ntick_ms = 0\n\n[[channels]]\nid = \"ch\"\n";
    let cfg = load_toml(toml).unwrap();
    assert!(cfg.validate().is_err());
}
