use serde_json::json;

use relay_api::{now_ms, IngestRequest};

// ═══════════════════════════════════════════════════════════════
//  RNG (xorshift64)
// ═══════════════════════════════════════════════════════════════

pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: i64) -> Self {
        let state = if seed == 0 {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64
                | 1 // ensure non-zero
        } else {
            seed as u64
        };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Returns f64 in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / ((1u64 << 53) as f64)
    }

    /// Шаг random walk в [-1, 1) * scale.
    pub fn walk(&mut self, scale: f64) -> f64 {
        (self.next_f64() * 2.0 - 1.0) * scale
    }
}

// ═══════════════════════════════════════════════════════════════
//  Sensors
// ═══════════════════════════════════════════════════════════════

const TRAFFIC_ZONES: [&str; 5] = ["old_town", "new_town", "leith", "haymarket", "stockbridge"];

const EVENT_VENUES: [&str; 4] = ["castle", "usher_hall", "meadows", "royal_mile"];

/// Один источник симулированной телеметрии. Каждый раунд tick()
/// делает random walk внутреннего состояния, payload() отдаёт
/// текущий JSON в форме соответствующего record_type.
pub enum Sensor {
    Weather {
        temperature_c: f64,
        wind_kph: f64,
        humidity: f64,
    },
    Traffic {
        congestion: [f64; 5],
    },
    Events {
        active: usize,
    },
    SystemStatus {
        tick: u64,
        started_ms: i64,
    },
}

impl Sensor {
    pub fn name(&self) -> &'static str {
        match self {
            Sensor::Weather { .. } => "weather_data",
            Sensor::Traffic { .. } => "traffic_zones",
            Sensor::Events { .. } => "events_data",
            Sensor::SystemStatus { .. } => "system_status",
        }
    }

    pub fn tick(&mut self, rng: &mut Rng) {
        match self {
            Sensor::Weather {
                temperature_c,
                wind_kph,
                humidity,
            } => {
                *temperature_c += rng.walk(0.5);
                *wind_kph = (*wind_kph + rng.walk(3.0)).max(0.0);
                *humidity = (*humidity + rng.walk(2.0)).clamp(20.0, 100.0);
            }
            Sensor::Traffic { congestion } => {
                for c in congestion.iter_mut() {
                    *c = (*c + rng.walk(0.1)).clamp(0.0, 1.0);
                }
            }
            Sensor::Events { active } => {
                let delta = rng.walk(1.5).round() as i64;
                *active = (*active as i64 + delta).clamp(0, 12) as usize;
            }
            Sensor::SystemStatus { tick, .. } => {
                *tick += 1;
            }
        }
    }

    pub fn payload(&self) -> serde_json::Value {
        match self {
            Sensor::Weather {
                temperature_c,
                wind_kph,
                humidity,
            } => {
                let condition = if *humidity > 85.0 {
                    "rain"
                } else if *humidity > 65.0 {
                    "overcast"
                } else {
                    "clear"
                };
                json!({
                    "temperature_c": (temperature_c * 10.0).round() / 10.0,
                    "wind_kph": (wind_kph * 10.0).round() / 10.0,
                    "humidity": humidity.round(),
                    "condition": condition,
                })
            }
            Sensor::Traffic { congestion } => {
                let zones: Vec<serde_json::Value> = TRAFFIC_ZONES
                    .iter()
                    .zip(congestion.iter())
                    .map(|(zone, c)| {
                        json!({
                            "zone": zone,
                            "congestion_pct": (c * 100.0).round(),
                            "vehicles": (c * 1200.0).round(),
                        })
                    })
                    .collect();
                json!({ "zones": zones })
            }
            Sensor::Events { active } => {
                let venues: Vec<&str> = EVENT_VENUES
                    .iter()
                    .take((*active).min(EVENT_VENUES.len()))
                    .copied()
                    .collect();
                json!({
                    "active_events": active,
                    "venues": venues,
                })
            }
            Sensor::SystemStatus { tick, started_ms } => {
                let uptime_s = (now_ms() - started_ms) / 1000;
                json!({
                    "status": "running",
                    "tick": tick,
                    "uptime_s": uptime_s,
                })
            }
        }
    }

    /// Собрать тело POST для relay. sim_timestamp — номер раунда
    /// симуляции, real_timestamp — часы producer'а; store relay всё
    /// равно проставит своё received_at.
    pub fn to_request(&self, round: u64) -> IngestRequest {
        IngestRequest {
            record_type: Some(self.name().to_string()),
            payload: Some(self.payload()),
            sim_timestamp: Some(json!(round)),
            real_timestamp: Some(json!(now_ms())),
        }
    }
}

pub fn new_sensors() -> Vec<Sensor> {
    vec![
        Sensor::Weather {
            temperature_c: 11.0,
            wind_kph: 18.0,
            humidity: 70.0,
        },
        Sensor::Traffic {
            congestion: [0.45, 0.35, 0.25, 0.50, 0.20],
        },
        Sensor::Events { active: 3 },
        Sensor::SystemStatus {
            tick: 0,
            started_ms: now_ms(),
        },
    ]
}
