//! Bridge frame decoding.
//!
//! The bridge sends one JSON object per message:
//!
//! ```text
//! { "connected": true,
//!   "physics":  { "speedKmh": 142.7, "gear": 4, "rpms": 7200, "gas": 1.0, "brake": 0.0 },
//!   "graphics": { "iCurrentTime": 45230 } }
//! ```
//!
//! A falsy `connected` means the bridge is up but no simulator session is
//! running; that decodes to [`Decoded::Idle`], not to an error. Decoding is pure:
//! the same input always gives the same output.
//!
//! ```rust
//! use lapclock::decoder::{Decoded, decode};
//!
//! let raw = r#"{"connected":true,
//!     "physics":{"speedKmh":142.7,"gear":4,"rpms":7200,"gas":0.8,"brake":0.0},
//!     "graphics":{"iCurrentTime":45230}}"#;
//!
//! match decode(raw).unwrap() {
//!     Decoded::Sample(frame) => assert_eq!(frame.snapshot.speed_kmh, 143),
//!     Decoded::Idle { .. } => unreachable!(),
//! }
//! ```

use serde::Deserialize;
use serde_json::Value;

use crate::types::{Gear, SimInfo, TelemetryFrame, TelemetrySnapshot};
use crate::{Result, TimingError};

/// Outcome of decoding one bridge message.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Bridge is alive but has no simulator session to report.
    Idle { message: Option<String> },

    /// Full telemetry sample.
    Sample(TelemetryFrame),
}

#[derive(Deserialize)]
struct WireSample {
    physics: WirePhysics,
    graphics: WireGraphics,
    #[serde(default, rename = "static")]
    static_info: Option<WireStatic>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePhysics {
    speed_kmh: f64,
    gear: f64,
    rpms: f64,
    gas: f64,
    brake: f64,
}

#[derive(Deserialize)]
struct WireGraphics {
    // Bridges send either naming, sometimes both; the prefixed one wins.
    #[serde(default, rename = "iCurrentTime")]
    i_current_time: Option<f64>,
    #[serde(default, rename = "currentTime")]
    current_time: Option<f64>,
    #[serde(default, rename = "iLastTime")]
    i_last_time: Option<f64>,
    #[serde(default, rename = "lastTime")]
    last_time: Option<f64>,
    #[serde(default, rename = "iBestTime")]
    i_best_time: Option<f64>,
    #[serde(default, rename = "bestTime")]
    best_time: Option<f64>,
    #[serde(default, rename = "completedLaps")]
    completed_laps: Option<f64>,
    #[serde(default)]
    position: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStatic {
    #[serde(default)]
    car_model: Option<String>,
    #[serde(default)]
    track: Option<String>,
    #[serde(default)]
    player_name: Option<String>,
    #[serde(default)]
    max_rpm: Option<f64>,
}

/// Decode one bridge message.
///
/// Returns a [`TimingError::Decode`] for anything that is not a well-formed
/// frame. Callers drop such frames; a decode error never ends a session.
pub fn decode(raw: &str) -> Result<Decoded> {
    let value: Value = serde_json::from_str(raw)?;

    let connected = value
        .get("connected")
        .ok_or_else(|| TimingError::decode("frame", "missing 'connected' field"))?;

    if !is_truthy(connected) {
        let message = value.get("message").and_then(Value::as_str).map(str::to_owned);
        return Ok(Decoded::Idle { message });
    }

    let wire: WireSample = serde_json::from_value(value)
        .map_err(|e| TimingError::decode("connected frame", e.to_string()))?;

    wire.into_frame().map(Decoded::Sample)
}

impl WireSample {
    fn into_frame(self) -> Result<TelemetryFrame> {
        let physics = self.physics;
        let snapshot = TelemetrySnapshot {
            speed_kmh: physics.speed_kmh.round() as i32,
            gear: Gear::from_raw(physics.gear.round() as i32),
            rpm: physics.rpms.max(0.0).round() as u32,
            throttle: unit(physics.gas),
            brake: unit(physics.brake),
        };

        let graphics = self.graphics;
        let current_time = graphics
            .i_current_time
            .or(graphics.current_time)
            .ok_or_else(|| TimingError::decode("connected frame", "missing field `iCurrentTime`"))?;
        let mut sim = SimInfo {
            last_lap_ms: graphics.i_last_time.or(graphics.last_time).map(|t| t.round() as i64),
            best_lap_ms: graphics.i_best_time.or(graphics.best_time).map(|t| t.round() as i64),
            completed_laps: graphics.completed_laps.map(count),
            position: graphics.position.map(count),
            ..SimInfo::default()
        };

        if let Some(info) = self.static_info {
            sim.car_model = info.car_model;
            sim.track = info.track;
            sim.player_name = info.player_name;
            sim.max_rpm = info.max_rpm.map(count);
        }

        Ok(TelemetryFrame { snapshot, current_time_ms: current_time.round() as i64, sim })
    }
}

fn unit(value: f64) -> f32 {
    (value as f32).clamp(0.0, 1.0)
}

fn count(value: f64) -> u32 {
    value.max(0.0).round() as u32
}

// JavaScript truthiness, which is what the bridge's consumers have always used.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample(raw: Value) -> TelemetryFrame {
        match decode(&raw.to_string()).expect("frame should decode") {
            Decoded::Sample(frame) => frame,
            Decoded::Idle { .. } => panic!("expected a sample"),
        }
    }

    #[test]
    fn decodes_reference_frame() {
        let frame = sample(json!({
            "connected": true,
            "physics": { "speedKmh": 142.7, "gear": 4, "rpms": 7200, "gas": 0.85, "brake": 0.0 },
            "graphics": { "iCurrentTime": 45230 }
        }));

        assert_eq!(frame.snapshot.speed_kmh, 143);
        assert_eq!(frame.snapshot.gear, Gear::Forward(3));
        assert_eq!(frame.snapshot.rpm, 7200);
        assert!((frame.snapshot.throttle - 0.85).abs() < f32::EPSILON);
        assert_eq!(frame.snapshot.brake, 0.0);
        assert_eq!(frame.current_time_ms, 45230);
        assert!(frame.sim.is_empty());
    }

    #[test]
    fn accepts_short_graphics_names_and_extras() {
        let frame = sample(json!({
            "connected": true,
            "physics": { "speedKmh": 0.4, "gear": 0, "rpms": 900.6, "gas": 1.7, "brake": -0.2 },
            "graphics": {
                "currentTime": 1200, "lastTime": 91234, "bestTime": 88901,
                "completedLaps": 3, "position": 2, "flag": 0
            },
            "static": { "maxRpm": 8500, "carModel": "ks_mazda_mx5_cup", "track": "magione", "playerName": "Driver" }
        }));

        assert_eq!(frame.snapshot.speed_kmh, 0);
        assert_eq!(frame.snapshot.gear, Gear::Reverse);
        assert_eq!(frame.snapshot.rpm, 901);
        assert_eq!(frame.snapshot.throttle, 1.0);
        assert_eq!(frame.snapshot.brake, 0.0);
        assert_eq!(frame.current_time_ms, 1200);
        assert_eq!(frame.sim.last_lap_ms, Some(91234));
        assert_eq!(frame.sim.best_lap_ms, Some(88901));
        assert_eq!(frame.sim.completed_laps, Some(3));
        assert_eq!(frame.sim.position, Some(2));
        assert_eq!(frame.sim.max_rpm, Some(8500));
        assert_eq!(frame.sim.car_model.as_deref(), Some("ks_mazda_mx5_cup"));
        assert_eq!(frame.sim.track.as_deref(), Some("magione"));
    }

    #[test]
    fn both_time_namings_in_one_frame_prefer_prefixed() {
        let frame = sample(json!({
            "connected": true,
            "physics": { "speedKmh": 150.0, "gear": 5, "rpms": 7000, "gas": 1.0, "brake": 0.0 },
            "graphics": {
                "iCurrentTime": 45230, "currentTime": 45220,
                "iLastTime": 91234, "lastTime": 91200,
                "iBestTime": 88901, "bestTime": 88900
            }
        }));

        assert_eq!(frame.current_time_ms, 45230);
        assert_eq!(frame.sim.last_lap_ms, Some(91234));
        assert_eq!(frame.sim.best_lap_ms, Some(88901));
    }

    #[test]
    fn falsy_connected_is_idle_not_error() {
        let waiting = json!({ "connected": false, "message": "Waiting for the simulator..." });
        assert_eq!(
            decode(&waiting.to_string()).unwrap(),
            Decoded::Idle { message: Some("Waiting for the simulator...".to_string()) }
        );

        for connected in [json!(0), json!(null), json!("")] {
            let raw = json!({ "connected": connected, "physics": "garbage" });
            assert_eq!(decode(&raw.to_string()).unwrap(), Decoded::Idle { message: None });
        }
    }

    #[test]
    fn malformed_frames_are_decode_errors() {
        let cases = [
            "not json".to_string(),
            "[1, 2, 3]".to_string(),
            json!({ "physics": {} }).to_string(),
            json!({ "connected": true }).to_string(),
            json!({
                "connected": true,
                "physics": { "speedKmh": 100.0, "gear": 3, "rpms": 5000, "gas": 1.0 },
                "graphics": { "iCurrentTime": 1 }
            })
            .to_string(),
            json!({
                "connected": true,
                "physics": { "speedKmh": 100.0, "gear": 3, "rpms": 5000, "gas": 1.0, "brake": 0.0 },
                "graphics": {}
            })
            .to_string(),
        ];

        for raw in &cases {
            let result = decode(raw);
            assert!(
                matches!(result, Err(TimingError::Decode { .. })),
                "expected decode error for {raw}, got {result:?}"
            );
        }
    }

    #[test]
    fn decoding_is_deterministic() {
        let raw = json!({
            "connected": true,
            "physics": { "speedKmh": 88.5, "gear": 3, "rpms": 6100, "gas": 0.5, "brake": 0.1 },
            "graphics": { "iCurrentTime": -1 }
        })
        .to_string();

        assert_eq!(decode(&raw).unwrap(), decode(&raw).unwrap());
    }

    proptest! {
        #[test]
        fn arbitrary_input_never_panics(raw in ".*") {
            let _ = decode(&raw);
        }

        #[test]
        fn speed_is_rounded_to_nearest(speed in 0.0f64..400.0) {
            let frame = sample(json!({
                "connected": true,
                "physics": { "speedKmh": speed, "gear": 2, "rpms": 3000, "gas": 0.3, "brake": 0.0 },
                "graphics": { "iCurrentTime": 100 }
            }));
            prop_assert_eq!(frame.snapshot.speed_kmh, speed.round() as i32);
        }
    }
}
