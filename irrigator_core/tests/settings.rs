//! The named-settings write/read surface and its persistence behavior.

use irrigator_core::mocks::{MemoryStore, RecordingPump, SharedLevel, SharedProbe};
use irrigator_core::{PlantChannel, SettingError};
use rstest::rstest;

type TestChannel = PlantChannel<SharedProbe, SharedLevel, RecordingPump>;

fn channel() -> TestChannel {
    channel_with_store(MemoryStore::new())
}

fn channel_with_store(store: MemoryStore) -> TestChannel {
    PlantChannel::builder(
        "ch1",
        SharedProbe::new(2042),
        SharedLevel::new(true),
        RecordingPump::new(),
    )
    .config_store(Box::new(store))
    .try_build()
    .unwrap()
}

#[rstest]
#[case("min_moisture_target", "55")]
#[case("max_moisture_target", "95")]
#[case("pump_dose_ms", "4500")]
#[case("between_doses_ms", "600000")]
#[case("max_doses_per_cycle", "3")]
#[case("plant_name", "thyme")]
#[case("watering_enabled", "true")]
#[case("moisture_counts_dry", "3100")]
#[case("moisture_counts_wet", "1200")]
fn settings_round_trip(#[case] key: &str, #[case] value: &str) {
    let mut ch = channel();
    ch.apply_setting(key, value).unwrap();
    assert_eq!(ch.setting(key).as_deref(), Some(value));
}

#[rstest]
#[case("min_moisture_target", "85")] // above the default max of 80
#[case("min_moisture_target", "-5")]
#[case("min_moisture_target", "soggy")]
#[case("max_moisture_target", "65")] // below the default min of 70
#[case("max_moisture_target", "101")]
#[case("pump_dose_ms", "0")]
#[case("pump_dose_ms", "-200")]
#[case("max_doses_per_cycle", "0")]
#[case("watering_enabled", "maybe")]
#[case("plant_name", "  ")]
#[case("moisture_counts_dry", "1470")] // equals the wet point
#[case("moisture_counts_wet", "2900")] // equals the dry point
fn invalid_values_are_rejected(#[case] key: &str, #[case] value: &str) {
    let mut ch = channel();
    let before = ch.setting(key);
    let err = ch.apply_setting(key, value).unwrap_err();
    assert!(matches!(err, SettingError::InvalidValue { .. }));
    assert_eq!(ch.setting(key), before);
}

#[test]
fn unknown_key_is_rejected() {
    let mut ch = channel();
    let err = ch.apply_setting("sprinkler_angle", "45").unwrap_err();
    assert!(matches!(err, SettingError::UnknownKey(_)));
    assert_eq!(ch.setting("sprinkler_angle"), None);
}

#[test]
fn settings_persist_into_the_store() {
    let store = MemoryStore::new();
    let mut ch = channel_with_store(store.clone());
    ch.apply_setting("pump_dose_ms", "2500").unwrap();

    use irrigator_traits::ConfigStore;
    assert_eq!(store.get("pump_dose_ms").as_deref(), Some("2500"));
}

#[test]
fn persist_failure_keeps_the_in_memory_value() {
    let store = MemoryStore::new();
    let mut ch = channel_with_store(store.clone());
    store.fail_writes(true);

    let err = ch.apply_setting("pump_dose_ms", "2500").unwrap_err();
    assert!(matches!(err, SettingError::Persist { .. }));
    assert_eq!(ch.setting("pump_dose_ms").as_deref(), Some("2500"));
}

#[test]
fn persisted_settings_are_restored_at_construction() {
    let store = MemoryStore::new()
        .with_value("plant_name", "rosemary")
        .with_value("min_moisture_target", "40")
        .with_value("max_moisture_target", "55")
        .with_value("pump_dose_ms", "1500")
        .with_value("max_doses_per_cycle", "2");

    let ch = channel_with_store(store);
    assert_eq!(ch.setting("plant_name").as_deref(), Some("rosemary"));
    assert_eq!(ch.setting("min_moisture_target").as_deref(), Some("40"));
    assert_eq!(ch.setting("max_moisture_target").as_deref(), Some("55"));
    assert_eq!(ch.setting("pump_dose_ms").as_deref(), Some("1500"));
    assert_eq!(ch.setting("max_doses_per_cycle").as_deref(), Some("2"));
}

#[test]
fn stored_target_band_above_the_defaults_restores_as_a_pair() {
    // Both endpoints moved above the default band; restoring either one
    // alone would clash with the other default.
    let store = MemoryStore::new()
        .with_value("min_moisture_target", "85")
        .with_value("max_moisture_target", "95");

    let ch = channel_with_store(store);
    assert_eq!(ch.setting("min_moisture_target").as_deref(), Some("85"));
    assert_eq!(ch.setting("max_moisture_target").as_deref(), Some("95"));
}

#[test]
fn corrupt_stored_values_are_skipped() {
    let store = MemoryStore::new()
        .with_value("pump_dose_ms", "forever")
        .with_value("max_doses_per_cycle", "4");

    let ch = channel_with_store(store);
    assert_eq!(ch.setting("pump_dose_ms").as_deref(), Some("3000"));
    assert_eq!(ch.setting("max_doses_per_cycle").as_deref(), Some("4"));
}
