//! Publication (C9, `spec.md` §4.9): translates decoded readings into
//! pub/sub state updates, and derives aggregate readings (heat output,
//! instantaneous COP, seasonal COP) from the primary readings that feed
//! them.

use std::sync::Mutex;

use repository::Value;
use tracing::warn;

use crate::pubsub::Publisher;
use crate::topics;

/// The repository names feeding the aggregate derivations. Not hardcoded as
/// bare string literals scattered through the module — a single config
/// value the runtime wires up from the loaded repository/config, so a
/// differently-named repository still derives aggregates correctly.
#[derive(Debug, Clone)]
pub struct AggregateInputNames {
    pub inlet_temp: String,
    pub outlet_temp: String,
    pub flow_lpm: String,
    pub power_consumption: String,
    pub total_generated_energy: String,
    pub total_consumed_energy: String,
}

impl Default for AggregateInputNames {
    fn default() -> Self {
        AggregateInputNames {
            inlet_temp: "VAR_IN_TEMP_WATER_IN".to_owned(),
            outlet_temp: "VAR_IN_TEMP_WATER_OUT".to_owned(),
            flow_lpm: "VAR_IN_FLOW_SENSOR_CALC".to_owned(),
            power_consumption: "NASA_OUTDOOR_CONTROL_WATTMETER_1UNIT".to_owned(),
            total_generated_energy: "LVAR_TOTAL_GENERATED_ENERGY".to_owned(),
            total_consumed_energy: "LVAR_TOTAL_CONSUMED_ENERGY".to_owned(),
        }
    }
}

#[derive(Debug, Default)]
struct AggregateState {
    inlet_temp: Option<f64>,
    outlet_temp: Option<f64>,
    flow_lpm: Option<f64>,
    power_consumption: Option<f64>,
    total_generated_energy: Option<f64>,
    total_consumed_energy: Option<f64>,
}

/// Derived water-side specific heat constant used by the heat-output
/// formula (`spec.md` §4.9, §8 scenario 5).
const WATER_SPECIFIC_HEAT: f64 = 4190.0;

pub struct Publication<P: Publisher> {
    publisher: P,
    prefix: String,
    discovery_root: String,
    platform: String,
    device_id: String,
    aggregate_names: AggregateInputNames,
    state: Mutex<AggregateState>,
}

impl<P: Publisher> Publication<P> {
    pub fn new(
        publisher: P,
        prefix: String,
        discovery_root: String,
        platform: String,
        device_id: String,
        aggregate_names: AggregateInputNames,
    ) -> Self {
        Publication {
            publisher,
            prefix,
            discovery_root,
            platform,
            device_id,
            aggregate_names,
            state: Mutex::new(AggregateState::default()),
        }
    }

    /// Publish one decoded, known message's value, then feed it into the
    /// aggregate derivations and publish whichever of those now resolve.
    pub async fn publish_reading(&self, variable_name: &str, value: &Value) {
        let payload = reading_payload(value);
        self.publish_both_topics(variable_name, &payload).await;
        self.feed_aggregate(variable_name, value).await;
    }

    async fn publish_both_topics(&self, raw_name: &str, payload: &str) {
        let state_topic = topics::state_topic(&self.prefix, raw_name);
        if let Err(e) = self.publisher.publish(&state_topic, payload.to_owned()).await {
            warn!(error = %e, topic = %state_topic, "failed to publish state update");
        }
        let discovery_topic =
            topics::discovery_state_topic(&self.discovery_root, &self.platform, &self.device_id, raw_name);
        if let Err(e) = self.publisher.publish(&discovery_topic, payload.to_owned()).await {
            warn!(error = %e, topic = %discovery_topic, "failed to publish discovery state update");
        }
    }

    async fn feed_aggregate(&self, variable_name: &str, value: &Value) {
        let Value::Numeric(v) = value else { return };
        let names = &self.aggregate_names;

        let (heat_output, cop, seasonal_cop) = {
            let mut state = self.state.lock().expect("aggregate state lock");
            if variable_name == names.inlet_temp {
                state.inlet_temp = Some(*v);
            } else if variable_name == names.outlet_temp {
                state.outlet_temp = Some(*v);
            } else if variable_name == names.flow_lpm {
                state.flow_lpm = Some(*v);
            } else if variable_name == names.power_consumption {
                state.power_consumption = Some(*v);
            } else if variable_name == names.total_generated_energy {
                state.total_generated_energy = Some(*v);
            } else if variable_name == names.total_consumed_energy {
                state.total_consumed_energy = Some(*v);
            } else {
                return;
            }

            let heat_output = heat_output_w(&state);
            let cop = heat_output.and_then(|h| instantaneous_cop(h, state.power_consumption));
            let seasonal_cop = seasonal_cop(&state);
            (heat_output, cop, seasonal_cop)
        };

        if let Some(w) = heat_output {
            self.publish_both_topics("VAR_HEAT_OUTPUT", &format_aggregate(w)).await;
        }
        if let Some(c) = cop {
            self.publish_both_topics("VAR_COP", &format_aggregate(c)).await;
        }
        if let Some(s) = seasonal_cop {
            self.publish_both_topics("VAR_SEASONAL_COP", &format_aggregate(s)).await;
        }
    }
}

/// `spec.md` §4.3 step 3 already rounds decoded readings to 3 decimals; C9
/// re-rounds non-integral floats to 2 for publication (§4.9). Rendered
/// without forced trailing zeros (`23.5`, not `23.50`), per §8 scenario 1.
fn reading_payload(value: &Value) -> String {
    match value {
        Value::Numeric(v) if v.fract() != 0.0 => format!("{}", (v * 100.0).round() / 100.0),
        other => other.to_payload_string(),
    }
}

/// Aggregates round to 3 decimals, matching `spec.md` §8 scenario 5's
/// worked example (not the 2-decimal rule used for primary readings).
fn format_aggregate(v: f64) -> String {
    format!("{:.3}", (v * 1000.0).round() / 1000.0)
}

fn heat_output_w(state: &AggregateState) -> Option<f64> {
    let (inlet, outlet, flow) = (state.inlet_temp?, state.outlet_temp?, state.flow_lpm?);
    let watts = (outlet - inlet).abs() * (flow / 60.0) * WATER_SPECIFIC_HEAT;
    (watts > 0.0 && watts < 15000.0).then_some(watts)
}

fn instantaneous_cop(heat_output_w: f64, power_consumption: Option<f64>) -> Option<f64> {
    let power = power_consumption?;
    if power <= 0.0 {
        return None;
    }
    let cop = heat_output_w / power;
    (cop > 0.0 && cop < 20.0).then_some(cop)
}

fn seasonal_cop(state: &AggregateState) -> Option<f64> {
    let (generated, consumed) = (state.total_generated_energy?, state.total_consumed_energy?);
    if consumed <= 0.0 {
        return None;
    }
    let cop = generated / consumed;
    (cop > 0.0 && cop < 20.0).then_some(cop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::BoxFuture;
    use std::sync::Mutex as StdMutex;

    struct RecordingPublisher {
        published: StdMutex<Vec<(String, String)>>,
    }

    impl RecordingPublisher {
        fn new() -> Self {
            RecordingPublisher {
                published: StdMutex::new(Vec::new()),
            }
        }
    }

    impl Publisher for RecordingPublisher {
        fn publish<'a>(
            &'a self,
            topic: &'a str,
            payload: String,
        ) -> BoxFuture<'a, Result<(), crate::pubsub::PubSubError>> {
            self.published.lock().unwrap().push((topic.to_owned(), payload));
            Box::pin(async { Ok(()) })
        }
    }

    fn publication() -> Publication<RecordingPublisher> {
        Publication::new(
            RecordingPublisher::new(),
            "ehsgateway".to_owned(),
            "homeassistant".to_owned(),
            "sensor".to_owned(),
            "ehs".to_owned(),
            AggregateInputNames::default(),
        )
    }

    #[tokio::test]
    async fn simple_reading_publishes_both_topics() {
        let pub_ = publication();
        pub_.publish_reading("NASA_OUTDOOR_TW1_TEMP", &Value::Numeric(23.5)).await;
        let published = pub_.publisher.published.lock().unwrap();
        assert!(published.iter().any(|(t, p)| t == "ehsgateway/entity/outdoorTw1Temp" && p == "23.5"));
        assert!(published
            .iter()
            .any(|(t, _)| t == "homeassistant/sensor/ehs_outdoorTw1Temp/state"));
    }

    #[tokio::test]
    async fn integral_numeric_is_not_forced_to_two_decimals() {
        let pub_ = publication();
        pub_.publish_reading("NASA_OUTDOOR_TW1_TEMP", &Value::Numeric(20.0)).await;
        let published = pub_.publisher.published.lock().unwrap();
        assert!(published.iter().any(|(_, p)| p == "20"));
    }

    #[tokio::test]
    async fn heat_output_derives_once_all_three_inputs_present() {
        let pub_ = publication();
        pub_.publish_reading("VAR_IN_TEMP_WATER_IN", &Value::Numeric(30.0)).await;
        pub_.publish_reading("VAR_IN_TEMP_WATER_OUT", &Value::Numeric(35.0)).await;
        pub_.publish_reading("VAR_IN_FLOW_SENSOR_CALC", &Value::Numeric(20.0)).await;

        let published = pub_.publisher.published.lock().unwrap();
        assert!(published
            .iter()
            .any(|(t, p)| t.ends_with("heatOutput") && p == "6983.333"));
    }

    #[tokio::test]
    async fn cop_derives_after_heat_output_and_power_both_present() {
        let pub_ = publication();
        pub_.publish_reading("VAR_IN_TEMP_WATER_IN", &Value::Numeric(30.0)).await;
        pub_.publish_reading("VAR_IN_TEMP_WATER_OUT", &Value::Numeric(35.0)).await;
        pub_.publish_reading("VAR_IN_FLOW_SENSOR_CALC", &Value::Numeric(20.0)).await;
        pub_.publish_reading(
            "NASA_OUTDOOR_CONTROL_WATTMETER_1UNIT",
            &Value::Numeric(2000.0),
        )
        .await;

        let published = pub_.publisher.published.lock().unwrap();
        assert!(published.iter().any(|(t, p)| t.ends_with("cop") && p == "3.492"));
    }

    #[tokio::test]
    async fn heat_output_out_of_bounds_is_not_published() {
        let pub_ = publication();
        pub_.publish_reading("VAR_IN_TEMP_WATER_IN", &Value::Numeric(30.0)).await;
        pub_.publish_reading("VAR_IN_TEMP_WATER_OUT", &Value::Numeric(30.0)).await; // delta 0
        pub_.publish_reading("VAR_IN_FLOW_SENSOR_CALC", &Value::Numeric(20.0)).await;

        let published = pub_.publisher.published.lock().unwrap();
        assert!(!published.iter().any(|(t, _)| t.ends_with("heatOutput")));
    }

    #[tokio::test]
    async fn seasonal_cop_derives_independently_of_instantaneous_inputs() {
        let pub_ = publication();
        pub_.publish_reading("LVAR_TOTAL_GENERATED_ENERGY", &Value::Numeric(500.0)).await;
        pub_.publish_reading("LVAR_TOTAL_CONSUMED_ENERGY", &Value::Numeric(200.0)).await;

        let published = pub_.publisher.published.lock().unwrap();
        assert!(published
            .iter()
            .any(|(t, p)| t.ends_with("seasonalCop") && p == "2.500"));
    }
}
