// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server configuration.

use std::time::Duration;

/// Baud rates above this use a fixed inter-character silence.
const FIXED_SILENCE_BAUD_RATE: u32 = 19_200;

/// Fixed inter-character silence for high baud rates.
const FIXED_SILENCE: Duration = Duration::from_micros(1_750);

/// Start bit, 8 data bits, parity or second stop bit, stop bit.
const BITS_PER_CHAR: u64 = 11;

/// Settings of the serve loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// How long to wait for the first byte of a request before the serve
    /// loop checks for shutdown again.
    pub timeout: Duration,

    /// Line silence that terminates a frame.
    pub inter_char_timeout: Duration,

    /// Answer requests addressed to the broadcast unit id `0`.
    ///
    /// Broadcast requests are always executed.
    pub broadcast_responses: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            inter_char_timeout: FIXED_SILENCE,
            broadcast_responses: false,
        }
    }
}

impl Config {
    /// Derive the frame delimiting silence from `baud_rate`.
    ///
    /// Modbus over serial line delimits frames by 3.5 character times of
    /// silence, fixed to 1.75 ms above 19200 baud.
    #[must_use]
    pub fn for_baud_rate(baud_rate: u32) -> Self {
        let inter_char_timeout = if baud_rate == 0 || baud_rate > FIXED_SILENCE_BAUD_RATE {
            FIXED_SILENCE
        } else {
            let char_time_us = BITS_PER_CHAR * 1_000_000 / u64::from(baud_rate);
            Duration::from_micros(char_time_us * 35 / 10)
        };
        Self {
            inter_char_timeout,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    #[must_use]
    pub fn with_inter_char_timeout(self, inter_char_timeout: Duration) -> Self {
        Self {
            inter_char_timeout,
            ..self
        }
    }

    #[must_use]
    pub fn with_broadcast_responses(self, broadcast_responses: bool) -> Self {
        Self {
            broadcast_responses,
            ..self
        }
    }
}
