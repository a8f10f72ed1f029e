use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::SimError;
use crate::layout::AircraftClass;

/// How a parameter is evaluated each time it is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParamMode {
    Off,
    #[default]
    Fixed,
    Random,
    /// Reserved for time-varying schedules; currently identical to fixed.
    Realistic,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Good,
    Mild,
    Bad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrafficMode {
    DeparturesOnly,
    ArrivalsOnly,
    #[default]
    Mixed,
}

/// Priority mode for hold release and runway ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriorityMode {
    #[default]
    Fifo,
    DepartFirst,
    ArriveFirst,
    /// Reserved; scoring semantics undefined, behaves as fifo.
    Weighted,
    SizePriority,
    Random,
}

/// Edge categorization used for speed and separation lookups.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    Runway,
    Taxiway,
    Apron,
}

/// Values a `Parameter` can hold. Numeric types additionally support
/// uniform sampling from a [min, max] range.
pub trait ParamValue: Clone {
    fn sample_range(_min: f64, _max: f64, _rng: &mut StdRng) -> Option<Self> {
        None
    }
}

impl ParamValue for f64 {
    fn sample_range(min: f64, max: f64, rng: &mut StdRng) -> Option<Self> {
        Some(rng.gen_range(min..=max))
    }
}

impl ParamValue for WeatherCondition {}

/// A configurable parameter: a mode plus the data the mode needs.
///
/// Serialized form is always the full object; the deserializer also
/// accepts a bare scalar, which is treated as mode = fixed.
#[derive(Debug, Clone, Serialize)]
pub struct Parameter<T> {
    pub mode: ParamMode,
    pub value: Option<T>,
    pub min_val: Option<f64>,
    pub max_val: Option<f64>,
    pub choices: Option<Vec<T>>,
}

impl<T> Parameter<T> {
    pub fn fixed(value: T) -> Self {
        Self {
            mode: ParamMode::Fixed,
            value: Some(value),
            min_val: None,
            max_val: None,
            choices: None,
        }
    }

    pub fn off() -> Self {
        Self {
            mode: ParamMode::Off,
            value: None,
            min_val: None,
            max_val: None,
            choices: None,
        }
    }
}

impl<T: ParamValue> Parameter<T> {
    /// Evaluate the parameter with the run-scoped RNG.
    pub fn evaluate(&self, rng: &mut StdRng) -> Option<T> {
        match self.mode {
            ParamMode::Off => None,
            ParamMode::Fixed | ParamMode::Realistic => self.value.clone(),
            ParamMode::Random => {
                if let Some(choices) = self.choices.as_ref().filter(|c| !c.is_empty()) {
                    let idx = rng.gen_range(0..choices.len());
                    return Some(choices[idx].clone());
                }
                if let (Some(min), Some(max)) = (self.min_val, self.max_val) {
                    if let Some(v) = T::sample_range(min, max, rng) {
                        return Some(v);
                    }
                }
                self.value.clone()
            }
        }
    }
}

impl<'de, T> Deserialize<'de> for Parameter<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr<T> {
            Full {
                #[serde(default)]
                mode: ParamMode,
                value: Option<T>,
                min_val: Option<f64>,
                max_val: Option<f64>,
                choices: Option<Vec<T>>,
            },
            Scalar(T),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Full { mode, value, min_val, max_val, choices } => Parameter {
                mode,
                value,
                min_val,
                max_val,
                choices,
            },
            Repr::Scalar(value) => Parameter {
                mode: ParamMode::Fixed,
                value: Some(value),
                min_val: None,
                max_val: None,
                choices: None,
            },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficParams {
    pub departure_spawn_rate: Parameter<f64>,
    pub arrival_spawn_rate: Parameter<f64>,
    pub departure_class_mix: BTreeMap<AircraftClass, f64>,
    pub arrival_class_mix: BTreeMap<AircraftClass, f64>,
    pub traffic_mode: TrafficMode,
}

impl Default for TrafficParams {
    fn default() -> Self {
        Self {
            departure_spawn_rate: Parameter::fixed(0.5),
            arrival_spawn_rate: Parameter::fixed(0.3),
            departure_class_mix: BTreeMap::from([
                (AircraftClass::Small, 0.2),
                (AircraftClass::Medium, 0.5),
                (AircraftClass::Large, 0.3),
            ]),
            arrival_class_mix: BTreeMap::from([
                (AircraftClass::Small, 0.3),
                (AircraftClass::Medium, 0.4),
                (AircraftClass::Large, 0.3),
            ]),
            traffic_mode: TrafficMode::Mixed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentParams {
    pub weather_condition: Parameter<WeatherCondition>,
    pub wind_speed: Parameter<f64>,
    /// Degrees, direction the wind is blowing from.
    pub wind_direction: Parameter<f64>,
}

impl Default for EnvironmentParams {
    fn default() -> Self {
        Self {
            weather_condition: Parameter::fixed(WeatherCondition::Good),
            wind_speed: Parameter::fixed(0.0),
            wind_direction: Parameter::fixed(180.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementParams {
    /// Base taxi speeds per aircraft class (m/s).
    pub speed_base: BTreeMap<AircraftClass, f64>,
    pub speed_mult_section: BTreeMap<SectionType, f64>,
    pub speed_mult_weather: BTreeMap<WeatherCondition, f64>,
}

impl Default for MovementParams {
    fn default() -> Self {
        Self {
            speed_base: BTreeMap::from([
                (AircraftClass::Small, 5.0),
                (AircraftClass::Medium, 6.0),
                (AircraftClass::Large, 4.0),
            ]),
            speed_mult_section: BTreeMap::from([
                (SectionType::Runway, 1.0),
                (SectionType::Taxiway, 0.8),
                (SectionType::Apron, 0.5),
            ]),
            speed_mult_weather: BTreeMap::from([
                (WeatherCondition::Good, 1.0),
                (WeatherCondition::Mild, 0.9),
                (WeatherCondition::Bad, 0.7),
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationParams {
    /// Base separation distances per section type (metres).
    pub runway: f64,
    pub taxiway: f64,
    pub apron: f64,
    pub weather_mult: BTreeMap<WeatherCondition, f64>,
}

impl Default for SeparationParams {
    fn default() -> Self {
        Self {
            runway: 100.0,
            taxiway: 50.0,
            apron: 30.0,
            weather_mult: BTreeMap::from([
                (WeatherCondition::Good, 1.0),
                (WeatherCondition::Mild, 1.2),
                (WeatherCondition::Bad, 1.5),
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PriorityParams {
    pub runway: PriorityMode,
    pub intersection: PriorityMode,
    pub hold_release: PriorityMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityParams {
    /// Gate counts per apron.
    pub gates: BTreeMap<String, u32>,
    /// Aircraft per runway; strictly one at a time.
    pub runway: u32,
}

impl Default for CapacityParams {
    fn default() -> Self {
        Self {
            gates: BTreeMap::from([("apron_A".to_string(), 10), ("apron_B".to_string(), 8)]),
            runway: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimControl {
    pub time_step_size: f64,
    pub total_duration: f64,
    pub random_seed: u64,
}

impl Default for SimControl {
    fn default() -> Self {
        Self { time_step_size: 1.0, total_duration: 3600.0, random_seed: 42 }
    }
}

/// Complete simulation parameter bundle, grouped the same way as its
/// JSON form.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SimulationParams {
    pub traffic: TrafficParams,
    pub environment: EnvironmentParams,
    pub movement: MovementParams,
    pub separation: SeparationParams,
    pub priority: PriorityParams,
    pub capacity: CapacityParams,
    pub simulation: SimControl,
}

/// Environment conditions evaluated once per tick and shared by the
/// spawner and the movement kernel.
#[derive(Debug, Clone, Copy)]
pub struct Environment {
    pub weather: WeatherCondition,
    pub wind_speed: f64,
    pub wind_direction: f64,
}

impl Environment {
    pub fn sample(params: &SimulationParams, rng: &mut StdRng) -> Self {
        let weather = params.weather(rng);
        let (wind_speed, wind_direction) = params.wind(rng);
        Self { weather, wind_speed, wind_direction }
    }
}

impl SimulationParams {
    /// Current spawn rate (aircraft/minute) for one direction,
    /// honouring the traffic mode.
    pub fn spawn_rate(&self, is_arrival: bool, rng: &mut StdRng) -> f64 {
        match self.traffic.traffic_mode {
            TrafficMode::DeparturesOnly if is_arrival => return 0.0,
            TrafficMode::ArrivalsOnly if !is_arrival => return 0.0,
            _ => {}
        }
        let param = if is_arrival {
            &self.traffic.arrival_spawn_rate
        } else {
            &self.traffic.departure_spawn_rate
        };
        param.evaluate(rng).unwrap_or(0.0)
    }

    pub fn weather(&self, rng: &mut StdRng) -> WeatherCondition {
        self.environment
            .weather_condition
            .evaluate(rng)
            .unwrap_or(WeatherCondition::Good)
    }

    /// Wind as (speed m/s, direction degrees-from).
    pub fn wind(&self, rng: &mut StdRng) -> (f64, f64) {
        let speed = self.environment.wind_speed.evaluate(rng).unwrap_or(0.0);
        let direction = self.environment.wind_direction.evaluate(rng).unwrap_or(0.0);
        (speed, direction)
    }

    /// speed = base[class] * section multiplier * weather multiplier
    pub fn speed_limit(
        &self,
        class: AircraftClass,
        section: SectionType,
        weather: WeatherCondition,
    ) -> f64 {
        let base = self.movement.speed_base.get(&class).copied().unwrap_or(5.0);
        let section_mult = self
            .movement
            .speed_mult_section
            .get(&section)
            .copied()
            .unwrap_or(1.0);
        let weather_mult = self
            .movement
            .speed_mult_weather
            .get(&weather)
            .copied()
            .unwrap_or(1.0);
        base * section_mult * weather_mult
    }

    /// separation = base[section] * weather multiplier
    pub fn separation(&self, section: SectionType, weather: WeatherCondition) -> f64 {
        let base = match section {
            SectionType::Runway => self.separation.runway,
            SectionType::Taxiway => self.separation.taxiway,
            SectionType::Apron => self.separation.apron,
        };
        let weather_mult = self
            .separation
            .weather_mult
            .get(&weather)
            .copied()
            .unwrap_or(1.0);
        base * weather_mult
    }

    pub fn class_mix(&self, is_arrival: bool) -> &BTreeMap<AircraftClass, f64> {
        if is_arrival {
            &self.traffic.arrival_class_mix
        } else {
            &self.traffic.departure_class_mix
        }
    }

    /// Sample an aircraft class from the directional mix.
    pub fn sample_aircraft_class(&self, is_arrival: bool, rng: &mut StdRng) -> AircraftClass {
        let mix = self.class_mix(is_arrival);
        let total: f64 = mix.values().sum();
        if total <= 0.0 {
            return AircraftClass::Medium;
        }
        let mut draw = rng.gen::<f64>() * total;
        for (class, weight) in mix {
            draw -= weight;
            if draw <= 0.0 {
                return *class;
            }
        }
        *mix.keys().next_back().unwrap_or(&AircraftClass::Medium)
    }

    /// Pre-run validation. Returns error messages, empty when usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let check_rate = |param: &Parameter<f64>, name: &str, errors: &mut Vec<String>| {
            if let Some(v) = param.value {
                if !v.is_finite() || v < 0.0 {
                    errors.push(format!("{name} must be a finite, non-negative number"));
                }
            }
            if let (Some(min), Some(max)) = (param.min_val, param.max_val) {
                if !min.is_finite() || !max.is_finite() || min > max {
                    errors.push(format!("{name} has an invalid [min, max] range"));
                }
            }
        };
        check_rate(&self.traffic.departure_spawn_rate, "departure spawn rate", &mut errors);
        check_rate(&self.traffic.arrival_spawn_rate, "arrival spawn rate", &mut errors);

        let check_mix = |mix: &BTreeMap<AircraftClass, f64>, name: &str, errors: &mut Vec<String>| {
            if mix.values().any(|p| !p.is_finite() || *p < 0.0) {
                errors.push(format!("{name} contains a negative or non-finite probability"));
                return;
            }
            let total: f64 = mix.values().sum();
            if !mix.is_empty() && (total - 1.0).abs() > 1e-3 {
                errors.push(format!("{name} probabilities sum to {total}, expected 1.0"));
            }
        };
        check_mix(&self.traffic.departure_class_mix, "departure class mix", &mut errors);
        check_mix(&self.traffic.arrival_class_mix, "arrival class mix", &mut errors);

        if !self.simulation.time_step_size.is_finite() || self.simulation.time_step_size <= 0.0 {
            errors.push("time_step_size must be positive".to_string());
        }
        if !self.simulation.total_duration.is_finite() || self.simulation.total_duration < 0.0 {
            errors.push("total_duration must be non-negative".to_string());
        }
        if self.movement.speed_base.values().any(|v| !v.is_finite() || *v < 0.0) {
            errors.push("base speeds must be finite and non-negative".to_string());
        }

        errors
    }

    /// Filtered mid-run merge: only spawn rates, weather, wind and
    /// priority modes may change; every other key is ignored. The RNG
    /// seed is honoured at construction only.
    pub fn apply_midrun_update(&mut self, updates: &serde_json::Value) {
        if let Some(traffic) = updates.get("traffic") {
            if let Some(v) = traffic.get("departure_spawn_rate") {
                if let Ok(p) = serde_json::from_value(v.clone()) {
                    self.traffic.departure_spawn_rate = p;
                }
            }
            if let Some(v) = traffic.get("arrival_spawn_rate") {
                if let Ok(p) = serde_json::from_value(v.clone()) {
                    self.traffic.arrival_spawn_rate = p;
                }
            }
        }
        if let Some(env) = updates.get("environment") {
            if let Some(v) = env.get("weather_condition") {
                if let Ok(p) = serde_json::from_value(v.clone()) {
                    self.environment.weather_condition = p;
                }
            }
            if let Some(v) = env.get("wind_speed") {
                if let Ok(p) = serde_json::from_value(v.clone()) {
                    self.environment.wind_speed = p;
                }
            }
            if let Some(v) = env.get("wind_direction") {
                if let Ok(p) = serde_json::from_value(v.clone()) {
                    self.environment.wind_direction = p;
                }
            }
        }
        if let Some(priority) = updates.get("priority") {
            if let Some(v) = priority.get("runway") {
                if let Ok(p) = serde_json::from_value(v.clone()) {
                    self.priority.runway = p;
                }
            }
            if let Some(v) = priority.get("intersection") {
                if let Ok(p) = serde_json::from_value(v.clone()) {
                    self.priority.intersection = p;
                }
            }
            if let Some(v) = priority.get("hold_release") {
                if let Ok(p) = serde_json::from_value(v.clone()) {
                    self.priority.hold_release = p;
                }
            }
        }
    }

    pub fn from_json(json: &str) -> Result<Self, SimError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
