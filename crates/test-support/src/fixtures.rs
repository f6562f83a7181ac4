//! Shared repository fixtures. The entries mirror the worked examples in
//! `spec.md` §8 plus enough of each kind/arithmetic shape (plain numeric,
//! scaled numeric, enum, string, writable) that codec and scheduler tests
//! don't each need to hand-roll YAML.

use repository::Repository;

pub const SAMPLE_REPOSITORY_YAML: &str = r#"
entries:
  - name: NASA_OUTDOOR_TW1_TEMP
    address: 0x4203
    kind: I16
    unit: "°C"
    forward_expr: "packed_value / 10"
  - name: NASA_OUTDOOR_TW2_TEMP
    address: 0x4204
    kind: I16
    unit: "°C"
    forward_expr: "packed_value / 10"
  - name: NASA_OUTDOOR_OUT_TEMP
    address: 0x4205
    kind: I16
    unit: "°C"
    forward_expr: "packed_value / 10"
  - name: VAR_IN_TEMP_WATER_IN
    address: 0x4210
    kind: I16
    unit: "°C"
    forward_expr: "packed_value / 10"
  - name: VAR_IN_TEMP_WATER_OUT
    address: 0x4211
    kind: I16
    unit: "°C"
    forward_expr: "packed_value / 10"
  - name: VAR_IN_FLOW_SENSOR_CALC
    address: 0x4212
    kind: I16
    unit: "L/min"
    forward_expr: "packed_value / 10"
  - name: NASA_OUTDOOR_CONTROL_WATTMETER_1UNIT
    address: 0x4220
    kind: I32
    unit: "W"
    forward_expr: "packed_value"
  - name: LVAR_TOTAL_GENERATED_ENERGY
    address: 0x4230
    kind: I32
    unit: "Wh"
    forward_expr: "packed_value"
  - name: LVAR_TOTAL_CONSUMED_ENERGY
    address: 0x4231
    kind: I32
    unit: "Wh"
    forward_expr: "packed_value"
  - name: ENUM_OUTDOOR_STATUS
    address: 0x4000
    kind: ENUM
    enum_map:
      0: "OFF"
      1: "ON"
  - name: ENUM_OUTDOOR_OPERATION_STATUS
    address: 0x4001
    kind: ENUM
    enum_map:
      0: "ICE_MAKING"
      1: "IDLE"
      2: "HEATING"
      3: "COOLING"
  - name: STR_OUTDOOR_MODEL_NAME
    address: 0x9010
    kind: STRING
  - name: VAR_IN_FSV_1031
    address: 0x4500
    kind: I16
    reverse_expr: "value * 10"
    writable: true
  - name: VAR_IN_FSV_1032
    address: 0x4501
    kind: I16
    reverse_expr: "value * 10"
    writable: true
  - name: VAR_IN_FSV_2011
    address: 0x4510
    kind: U8
    writable: true
  - name: NASA_EHSSENTINEL_UPTIME
    address: 0x9500
    kind: I32
    unit: "s"
"#;

/// 23 synthetic entries appended at load time (`VAR_TEST_01`..`VAR_TEST_23`),
/// giving the scheduler's chunking test (`spec.md` §8 scenario 6: a 23-variable
/// group at 3 frames of 10/10/3 per tick) a group that resolves cleanly
/// against the fixture repository.
pub fn sample_repository_with_settings_group() -> Repository {
    let mut yaml = SAMPLE_REPOSITORY_YAML.to_owned();
    for i in 1..=23u16 {
        yaml.push_str(&format!(
            "  - name: VAR_TEST_{i:02}\n    address: {addr:#06x}\n    kind: U8\n",
            addr = 0x5000 + i
        ));
    }
    Repository::load_from_str(&yaml).expect("fixture repository must be valid")
}

pub fn settings_group_names() -> Vec<String> {
    (1..=23u16).map(|i| format!("VAR_TEST_{i:02}")).collect()
}

pub fn sample_repository() -> Repository {
    Repository::load_from_str(SAMPLE_REPOSITORY_YAML).expect("fixture repository must be valid")
}

/// Variable names making up a `live_data`-shaped group, large enough
/// (23 entries by repetition of the fixture set) to exercise chunking.
pub fn live_data_group_names() -> Vec<String> {
    let base = [
        "NASA_OUTDOOR_TW1_TEMP",
        "NASA_OUTDOOR_TW2_TEMP",
        "NASA_OUTDOOR_OUT_TEMP",
        "VAR_IN_TEMP_WATER_IN",
        "VAR_IN_TEMP_WATER_OUT",
        "VAR_IN_FLOW_SENSOR_CALC",
        "NASA_OUTDOOR_CONTROL_WATTMETER_1UNIT",
        "ENUM_OUTDOOR_STATUS",
        "ENUM_OUTDOOR_OPERATION_STATUS",
    ];
    base.iter().map(|s| s.to_string()).collect()
}
