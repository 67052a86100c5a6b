//! Text form of [`Command`].
//!
//! Encoding is total and side-effect free. [`decode`] is the inverse a
//! conforming receiver applies.

use super::{Command, Edge, InputId, ProtocolError};
use std::fmt;

const MOUSE_MOVE: &str = "MOUSE_MOVE";
const STEER: &str = "STEER";

// Absorbs binary representation error so that decimal halves round away from zero.
const ROUNDING_EPSILON: f64 = 1e-6;

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::ButtonEdge(id, edge) => write!(f, "{}:{}", id, edge.as_str()),
            Command::MouseDelta(dx, dy) => write!(f, "{}:{},{}", MOUSE_MOVE, dx, dy),
            Command::SteerAngle(angle) => write!(f, "{}:{}", STEER, format_angle(*angle)),
        }
    }
}

pub fn encode(command: &Command) -> String {
    command.to_string()
}

/// Formats an angle with two decimals, halves rounded away from zero.
///
/// `-12.345` becomes `-12.35` and `37.5` becomes `37.50`. A value that rounds
/// to zero is printed without sign.
pub fn format_angle(angle: f64) -> String {
    let scaled = angle * 100.0;
    let centi = if scaled.is_finite() {
        (scaled + scaled.signum() * ROUNDING_EPSILON).round() as i64
    } else {
        0
    };
    let sign = if centi < 0 { "-" } else { "" };
    let abs = centi.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

pub fn decode(payload: &str) -> Result<Command, ProtocolError> {
    let (head, tail) = payload
        .split_once(':')
        .ok_or_else(|| ProtocolError::MissingSeparator(payload.to_string()))?;

    match head {
        MOUSE_MOVE => {
            let (dx, dy) = tail
                .split_once(',')
                .ok_or_else(|| ProtocolError::InvalidNumber(tail.to_string()))?;
            let dx = dx
                .parse::<i32>()
                .map_err(|_| ProtocolError::InvalidNumber(dx.to_string()))?;
            let dy = dy
                .parse::<i32>()
                .map_err(|_| ProtocolError::InvalidNumber(dy.to_string()))?;
            Ok(Command::MouseDelta(dx, dy))
        }
        STEER => tail
            .parse::<f64>()
            .map(Command::SteerAngle)
            .map_err(|_| ProtocolError::InvalidNumber(tail.to_string())),
        _ => {
            let id = head.parse::<InputId>()?;
            let edge = match tail {
                "DOWN" => Edge::Down,
                "UP" => Edge::Up,
                other => return Err(ProtocolError::UnknownEdge(other.to_string())),
            };
            Ok(Command::ButtonEdge(id, edge))
        }
    }
}
