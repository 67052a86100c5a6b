//! Wire protocol between the control surface and its peer.
//!
//! Every datagram carries exactly one UTF-8 command, no terminator and no
//! length prefix:
//!
//! ```text
//! <ID>:DOWN | <ID>:UP          discrete control transition
//! MOUSE_MOVE:<dx>,<dy>         relative pointer delta (integers)
//! STEER:<angle>                absolute tilt angle, two decimals
//! ```
//!
//! [`Command`] is the only value that crosses this boundary. The textual form
//! lives in [`encoder`].

pub mod encoder;

pub use encoder::{decode, encode, format_angle};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a physical control, fixed by the receiver.
///
/// Ordering is used to release held controls in a stable order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputId {
    Lmb,
    Rmb,
    BtnLb,
    BtnRb,
    BtnL1,
    BtnR1,
    BtnY,
    BtnA,
    BtnX,
    BtnB,
    BtnUp,
    BtnDown,
    BtnLeft,
    BtnRight,
    BtnSelect,
    BtnStart,
    Up,
    Down,
    Left,
    Right,
}

impl InputId {
    /// Complete vocabulary in wire order.
    pub const ALL: [InputId; 20] = [
        InputId::Lmb,
        InputId::Rmb,
        InputId::BtnLb,
        InputId::BtnRb,
        InputId::BtnL1,
        InputId::BtnR1,
        InputId::BtnY,
        InputId::BtnA,
        InputId::BtnX,
        InputId::BtnB,
        InputId::BtnUp,
        InputId::BtnDown,
        InputId::BtnLeft,
        InputId::BtnRight,
        InputId::BtnSelect,
        InputId::BtnStart,
        InputId::Up,
        InputId::Down,
        InputId::Left,
        InputId::Right,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            InputId::Lmb => "LMB",
            InputId::Rmb => "RMB",
            InputId::BtnLb => "BTN_LB",
            InputId::BtnRb => "BTN_RB",
            InputId::BtnL1 => "BTN_L1",
            InputId::BtnR1 => "BTN_R1",
            InputId::BtnY => "BTN_Y",
            InputId::BtnA => "BTN_A",
            InputId::BtnX => "BTN_X",
            InputId::BtnB => "BTN_B",
            InputId::BtnUp => "BTN_UP",
            InputId::BtnDown => "BTN_DOWN",
            InputId::BtnLeft => "BTN_LEFT",
            InputId::BtnRight => "BTN_RIGHT",
            InputId::BtnSelect => "BTN_SELECT",
            InputId::BtnStart => "BTN_START",
            InputId::Up => "UP",
            InputId::Down => "DOWN",
            InputId::Left => "LEFT",
            InputId::Right => "RIGHT",
        }
    }
}

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InputId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownInput(s.to_string()))
    }
}

/// Direction of a discrete transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Edge {
    Down,
    Up,
}

impl Edge {
    pub fn from_pressed(pressed: bool) -> Self {
        if pressed {
            Edge::Down
        } else {
            Edge::Up
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Edge::Down => "DOWN",
            Edge::Up => "UP",
        }
    }
}

/// A semantic event ready to be put on the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    ButtonEdge(InputId, Edge),
    MouseDelta(i32, i32),
    /// Tilt angle in degrees, roughly [-90, 90].
    SteerAngle(f64),
}

impl Command {
    pub fn down(id: InputId) -> Self {
        Command::ButtonEdge(id, Edge::Down)
    }

    pub fn up(id: InputId) -> Self {
        Command::ButtonEdge(id, Edge::Up)
    }

    /// Centred steering value sent when tilt steering is switched off.
    pub fn steer_center() -> Self {
        Command::SteerAngle(0.0)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ProtocolError {
    #[error("Missing ':' separator in command: {0}")]
    MissingSeparator(String),

    #[error("Unknown input id: {0}")]
    UnknownInput(String),

    #[error("Unknown edge: {0}")]
    UnknownEdge(String),

    #[error("Invalid number in command: {0}")]
    InvalidNumber(String),
}
