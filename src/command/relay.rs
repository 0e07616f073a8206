//! Relay-board configuration messages.
//!
//! Relay boards take their configuration as a bare JSON object on
//! `readers/addon/rb/1/{board}/do`. There is no correlation identifier and
//! no reply on this path.

use serde::{Deserialize, Serialize};

/// Active level of a relay output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLevel {
    Low,
    High,
}

/// One output line of a setup message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpioOutput {
    pub gpio: u32,
    pub on: OutputLevel,
}

/// Input line of a setup message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpioInput {
    pub gpio: u32,
}

/// Configuration sent to a relay board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum RelayBoardConfig {
    /// Declare the board's outputs and optional input.
    #[serde(rename = "c")]
    Setup {
        o: Vec<GpioOutput>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        i: Option<GpioInput>,
    },
    /// Switch output `o`, optionally falling back after `timeout`.
    #[serde(rename = "o")]
    Output {
        o: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
}
