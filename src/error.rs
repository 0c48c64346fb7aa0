// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types.
//!
//! Each layer of the request pipeline has its own error kind:
//!
//! - [`FramingError`]: the raw frame is unusable and is dropped silently.
//! - [`ProtocolError`]: the request is well-formed but invalid and is
//!   answered with an exception response.
//! - [`HandlerError`]: a registered handler rejected or failed to serve the
//!   request.

use std::error::Error as StdError;

use thiserror::Error;

use crate::ExceptionCode;

/// Transport level corruption of an RTU frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FramingError {
    /// Fewer bytes than unit id, function code and checksum.
    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    /// More bytes than the maximum RTU ADU size.
    #[error("frame too long: {0} bytes")]
    TooLong(usize),

    #[error("invalid checksum: expected 0x{expected:04X}, actual 0x{actual:04X}")]
    BadChecksum { expected: u16, actual: u16 },
}

/// A well-formed request that cannot be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("illegal function: 0x{0:02X}")]
    IllegalFunction(u8),

    #[error("illegal data address")]
    IllegalDataAddress,

    #[error("illegal data value")]
    IllegalDataValue,
}

impl ProtocolError {
    /// The exception code reported to the client.
    #[must_use]
    pub const fn exception_code(self) -> ExceptionCode {
        match self {
            Self::IllegalFunction(_) => ExceptionCode::IllegalFunction,
            Self::IllegalDataAddress => ExceptionCode::IllegalDataAddress,
            Self::IllegalDataValue => ExceptionCode::IllegalDataValue,
        }
    }
}

/// Failure of a registered handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler rejects the request with a specific exception code.
    #[error("exception: {0}")]
    Exception(ExceptionCode),

    /// Any unexpected failure, reported as [`ExceptionCode::ServerDeviceFailure`].
    #[error("fault: {0}")]
    Fault(#[source] Box<dyn StdError + Send + Sync>),
}

impl HandlerError {
    /// Wrap an arbitrary error or message as a fault.
    pub fn fault<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self::Fault(err.into())
    }
}

impl From<ExceptionCode> for HandlerError {
    fn from(from: ExceptionCode) -> Self {
        Self::Exception(from)
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(from: std::io::Error) -> Self {
        Self::fault(from)
    }
}

/// Why an operation could not be executed.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Handler(#[from] HandlerError),
}
