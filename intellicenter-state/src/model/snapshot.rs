//! The consolidated pool state handed to the display

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Current pool/spa, chemistry and circuit state.
///
/// Field names serialize exactly as the display expects them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Last reported pool temperature, kept while the pool is not circulating
    pub pool_temp: i64,
    /// Last reported spa temperature, kept while the spa is not circulating
    pub spa_temp: i64,
    pub pool_set_point: i64,
    pub spa_set_point: i64,
    pub pool_heater_status: bool,
    pub spa_heater_status: bool,
    /// Pool circulation active; qualifies `pool_temp` as live
    pub pool_status: bool,
    /// Spa circulation active; qualifies `spa_temp` as live
    pub spa_status: bool,
    pub ph_val: f64,
    /// Last nonzero pH
    #[serde(rename = "lastPHVal")]
    pub last_ph_val: f64,
    /// Oxidation-reduction potential in mV
    pub orp: i64,
    /// Last nonzero ORP
    pub last_orp_val: i64,
    /// Acid tank level, 1-based
    pub ph_tank: i64,
    #[serde(rename = "saltPPM")]
    pub salt_ppm: i64,
    /// Langelier saturation index
    pub saturation: f64,
    pub freeze_mode: bool,
    /// Tracked circuits by object name
    pub circuits: BTreeMap<String, CircuitState>,
}

/// One tracked circuit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitState {
    pub name: String,
    pub status: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_names() {
        let mut snapshot = Snapshot {
            last_ph_val: 7.4,
            salt_ppm: 3200,
            ..Default::default()
        };
        snapshot.circuits.insert(
            "C0003".to_string(),
            CircuitState {
                name: "Pool Light".to_string(),
                status: true,
            },
        );

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["lastPHVal"], json!(7.4));
        assert_eq!(value["saltPPM"], json!(3200));
        assert_eq!(value["poolSetPoint"], json!(0));
        assert_eq!(value["lastOrpVal"], json!(0));
        assert_eq!(value["phVal"], json!(0.0));
        assert_eq!(value["freezeMode"], json!(false));
        assert_eq!(
            value["circuits"]["C0003"],
            json!({"name": "Pool Light", "status": true})
        );
    }
}
