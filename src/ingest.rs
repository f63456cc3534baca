//! Gaze ingestion - normalizes raw sensor records into [`GazeSample`]s
//!
//! The wire contract with the gaze-estimation collaborator is a stream of
//! small text datagrams, either JSON or `k=v` tokens. Coordinates are
//! clamped into [0, 1], a missing confidence defaults to 1.0, and a missing
//! timestamp is stamped from the process monotonic clock. Malformed
//! datagrams are dropped, never an error.

use crate::pipeline::SampleSender;
use crate::types::GazeSample;
use anyhow::Result;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Instant;
use tokio::net::UdpSocket;

#[derive(Debug, Clone, Deserialize)]
struct JsonGazeMsg {
    x: f32,
    y: f32,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    timestamp: Option<u64>,
}

/// Optional UDP sensor address override from the environment
pub fn udp_addr_from_env() -> Option<SocketAddr> {
    let raw = std::env::var("RAYOS_GAZE_UDP_ADDR").ok()?;
    raw.parse::<SocketAddr>().ok()
}

/// Nanoseconds since process start, used to stamp samples that arrive
/// without their own timestamp
pub fn monotonic_now_ns() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_nanos() as u64
}

/// Parse one sensor datagram into a normalized sample
///
/// Accepted formats:
/// - JSON: `{"x":0.5,"y":0.5,"confidence":0.9,"timestamp":123}`
/// - k=v tokens: `x=0.5 y=0.5 conf=0.9 ts=123`
///
/// Timestamps on the wire are monotonic nanoseconds.
pub fn parse_sensor_message(msg: &str) -> Option<GazeSample> {
    let msg = msg.trim();
    if msg.is_empty() {
        return None;
    }

    if msg.starts_with('{') {
        if let Ok(j) = serde_json::from_str::<JsonGazeMsg>(msg) {
            return Some(normalize(j.x, j.y, j.confidence, j.timestamp));
        }
    }

    let mut x: Option<f32> = None;
    let mut y: Option<f32> = None;
    let mut confidence: Option<f32> = None;
    let mut timestamp: Option<u64> = None;

    for tok in msg.split_whitespace() {
        let (k, v) = tok.split_once('=')?;
        match k {
            "x" => x = v.parse().ok(),
            "y" => y = v.parse().ok(),
            "conf" | "confidence" => confidence = v.parse().ok(),
            "ts" | "timestamp" => timestamp = v.parse().ok(),
            _ => {}
        }
    }

    Some(normalize(x?, y?, confidence, timestamp))
}

fn normalize(x: f32, y: f32, confidence: Option<f32>, timestamp: Option<u64>) -> GazeSample {
    GazeSample {
        timestamp_ns: timestamp.unwrap_or_else(monotonic_now_ns),
        x_norm: x.clamp(0.0, 1.0),
        y_norm: y.clamp(0.0, 1.0),
        confidence: confidence.unwrap_or(1.0).clamp(0.0, 1.0),
    }
}

/// Listen for sensor datagrams and feed them into the pipeline's sample queue
pub async fn spawn_udp_ingest_task(bind_addr: SocketAddr, sender: SampleSender) -> Result<()> {
    let sock = UdpSocket::bind(bind_addr).await?;
    log::info!("UDP gaze listener bound on {bind_addr}");

    tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        loop {
            let (len, _src) = match sock.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("UDP gaze recv error: {e}");
                    continue;
                }
            };

            match std::str::from_utf8(&buf[..len]) {
                Ok(s) => match parse_sensor_message(s) {
                    Some(sample) => sender.push(sample),
                    None => log::debug!("dropping malformed gaze datagram: {s:?}"),
                },
                Err(_) => log::debug!("dropping non-UTF8 gaze datagram ({len} bytes)"),
            }
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_json_sample() {
        let s = parse_sensor_message(r#"{"x":0.25,"y":0.75,"confidence":0.9,"timestamp":123}"#)
            .expect("parse");
        assert!((s.x_norm - 0.25).abs() < 1e-6);
        assert!((s.y_norm - 0.75).abs() < 1e-6);
        assert!((s.confidence - 0.9).abs() < 1e-6);
        assert_eq!(s.timestamp_ns, 123);
    }

    #[test]
    fn parse_kv_sample() {
        let s = parse_sensor_message("x=0.1 y=0.2 conf=0.3 ts=42").expect("parse");
        assert!((s.x_norm - 0.1).abs() < 1e-6);
        assert!((s.y_norm - 0.2).abs() < 1e-6);
        assert!((s.confidence - 0.3).abs() < 1e-6);
        assert_eq!(s.timestamp_ns, 42);
    }

    #[test]
    fn out_of_range_coordinates_are_clamped() {
        let s = parse_sensor_message("x=1.7 y=-0.4 conf=2.0").expect("parse");
        assert_eq!(s.x_norm, 1.0);
        assert_eq!(s.y_norm, 0.0);
        assert_eq!(s.confidence, 1.0);
    }

    #[test]
    fn missing_confidence_defaults_to_full() {
        let s = parse_sensor_message("x=0.5 y=0.5 ts=9").expect("parse");
        assert_eq!(s.confidence, 1.0);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_sensor_message("").is_none());
        assert!(parse_sensor_message("y=0.5").is_none());
        assert!(parse_sensor_message("not a sample").is_none());
        assert!(parse_sensor_message("{\"x\":").is_none());
    }
}
