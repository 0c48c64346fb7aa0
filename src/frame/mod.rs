// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

pub(crate) mod rtu;

use std::{
    error,
    fmt::{self, Display},
};

/// A Modbus function code supported by this server.
///
/// The set is closed: any other byte in the function code position is
/// answered with [`ExceptionCode::IllegalFunction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    /// 01 (0x01) Read Coils.
    ReadCoils,

    /// 02 (0x02) Read Discrete Inputs
    ReadDiscreteInputs,

    /// 03 (0x03) Read Holding Registers
    ReadHoldingRegisters,

    /// 04 (0x04) Read Input Registers
    ReadInputRegisters,

    /// 05 (0x05) Write Single Coil
    WriteSingleCoil,

    /// 06 (0x06) Write Single Register
    WriteSingleRegister,

    /// 15 (0x0F) Write Multiple Coils
    WriteMultipleCoils,

    /// 16 (0x10) Write Multiple Registers
    WriteMultipleRegisters,
}

impl FunctionCode {
    /// Look up the [`FunctionCode`] for a raw `value`.
    ///
    /// Returns `None` for unsupported function codes.
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        let code = match value {
            0x01 => Self::ReadCoils,
            0x02 => Self::ReadDiscreteInputs,
            0x03 => Self::ReadHoldingRegisters,
            0x04 => Self::ReadInputRegisters,
            0x05 => Self::WriteSingleCoil,
            0x06 => Self::WriteSingleRegister,
            0x0F => Self::WriteMultipleCoils,
            0x10 => Self::WriteMultipleRegisters,
            _ => return None,
        };
        Some(code)
    }

    /// Gets the [`u8`] value of the current [`FunctionCode`].
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::ReadCoils => 0x01,
            Self::ReadDiscreteInputs => 0x02,
            Self::ReadHoldingRegisters => 0x03,
            Self::ReadInputRegisters => 0x04,
            Self::WriteSingleCoil => 0x05,
            Self::WriteSingleRegister => 0x06,
            Self::WriteMultipleCoils => 0x0F,
            Self::WriteMultipleRegisters => 0x10,
        }
    }

    /// `true` for the four read functions (1, 2, 3 and 4).
    #[must_use]
    pub const fn is_read(self) -> bool {
        matches!(
            self,
            Self::ReadCoils
                | Self::ReadDiscreteInputs
                | Self::ReadHoldingRegisters
                | Self::ReadInputRegisters
        )
    }
}

impl Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value().fmt(f)
    }
}

/// A Modbus protocol address is represented by 16 bit from `0` to `65535`.
///
/// This *protocol address* uses 0-based indexing, while the *coil address* or
/// *register address* is often specified as a number with 1-based indexing.
pub type Address = u16;

/// A Coil represents a single bit.
///
/// - `true` is equivalent to `ON`, `1` and `0xFF00`.
/// - `false` is equivalent to `OFF`, `0` and `0x0000`.
pub type Coil = bool;

/// Modbus uses 16 bit for its data items.
///
/// Transmitted using a big-endian representation.
pub type Word = u16;

/// Number of items to process.
pub type Quantity = u16;

/// A decoded request PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Address of the first coil and number of coils to read.
    ReadCoils(Address, Quantity),

    /// Address of the first discrete input and number of inputs to read.
    ReadDiscreteInputs(Address, Quantity),

    /// Address of the first holding register and number of registers to read.
    ReadHoldingRegisters(Address, Quantity),

    /// Address of the first input register and number of registers to read.
    ReadInputRegisters(Address, Quantity),

    /// Address of the coil and its new state.
    WriteSingleCoil(Address, Coil),

    /// Address of the register and its new value.
    WriteSingleRegister(Address, Word),

    /// Address of the first coil and the new states, one per coil.
    WriteMultipleCoils(Address, Vec<Coil>),

    /// Address of the first register and the new values, one per register.
    WriteMultipleRegisters(Address, Vec<Word>),
}

impl Operation {
    /// Get the [`FunctionCode`] of the [`Operation`].
    #[must_use]
    pub const fn function_code(&self) -> FunctionCode {
        use Operation::*;

        match self {
            ReadCoils(_, _) => FunctionCode::ReadCoils,
            ReadDiscreteInputs(_, _) => FunctionCode::ReadDiscreteInputs,
            ReadHoldingRegisters(_, _) => FunctionCode::ReadHoldingRegisters,
            ReadInputRegisters(_, _) => FunctionCode::ReadInputRegisters,
            WriteSingleCoil(_, _) => FunctionCode::WriteSingleCoil,
            WriteSingleRegister(_, _) => FunctionCode::WriteSingleRegister,
            WriteMultipleCoils(_, _) => FunctionCode::WriteMultipleCoils,
            WriteMultipleRegisters(_, _) => FunctionCode::WriteMultipleRegisters,
        }
    }

    /// Start address of the addressed range.
    #[must_use]
    pub const fn address(&self) -> Address {
        use Operation::*;

        match self {
            ReadCoils(address, _)
            | ReadDiscreteInputs(address, _)
            | ReadHoldingRegisters(address, _)
            | ReadInputRegisters(address, _)
            | WriteSingleCoil(address, _)
            | WriteSingleRegister(address, _)
            | WriteMultipleCoils(address, _)
            | WriteMultipleRegisters(address, _) => *address,
        }
    }

    /// Number of addressed coils or registers.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn quantity(&self) -> Quantity {
        use Operation::*;

        match self {
            ReadCoils(_, quantity)
            | ReadDiscreteInputs(_, quantity)
            | ReadHoldingRegisters(_, quantity)
            | ReadInputRegisters(_, quantity) => *quantity,
            WriteSingleCoil(_, _) | WriteSingleRegister(_, _) => 1,
            // Bounded by the quantity limits checked while decoding.
            WriteMultipleCoils(_, coils) => coils.len() as Quantity,
            WriteMultipleRegisters(_, words) => words.len() as Quantity,
        }
    }
}

/// The data of a successfully executed [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The coil values that have been read, one per requested coil.
    ReadCoils(Vec<Coil>),

    /// The discrete input values that have been read.
    ReadDiscreteInputs(Vec<Coil>),

    /// The holding register values that have been read.
    ReadHoldingRegisters(Vec<Word>),

    /// The input register values that have been read.
    ReadInputRegisters(Vec<Word>),

    /// Echo of the written coil address and state.
    WriteSingleCoil(Address, Coil),

    /// Echo of the written register address and value.
    WriteSingleRegister(Address, Word),

    /// Start address and number of coils written.
    WriteMultipleCoils(Address, Quantity),

    /// Start address and number of registers written.
    WriteMultipleRegisters(Address, Quantity),
}

impl Response {
    /// Get the [`FunctionCode`] of the [`Response`].
    #[must_use]
    pub const fn function_code(&self) -> FunctionCode {
        use Response::*;

        match self {
            ReadCoils(_) => FunctionCode::ReadCoils,
            ReadDiscreteInputs(_) => FunctionCode::ReadDiscreteInputs,
            ReadHoldingRegisters(_) => FunctionCode::ReadHoldingRegisters,
            ReadInputRegisters(_) => FunctionCode::ReadInputRegisters,
            WriteSingleCoil(_, _) => FunctionCode::WriteSingleCoil,
            WriteSingleRegister(_, _) => FunctionCode::WriteSingleRegister,
            WriteMultipleCoils(_, _) => FunctionCode::WriteMultipleCoils,
            WriteMultipleRegisters(_, _) => FunctionCode::WriteMultipleRegisters,
        }
    }
}

/// A server (slave) exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionCode {
    /// 0x01
    IllegalFunction,
    /// 0x02
    IllegalDataAddress,
    /// 0x03
    IllegalDataValue,
    /// 0x04
    ServerDeviceFailure,
    /// 0x05
    Acknowledge,
    /// 0x06
    ServerDeviceBusy,
    /// 0x08
    MemoryParityError,
}

impl From<ExceptionCode> for u8 {
    fn from(from: ExceptionCode) -> Self {
        use crate::frame::ExceptionCode::*;
        match from {
            IllegalFunction => 0x01,
            IllegalDataAddress => 0x02,
            IllegalDataValue => 0x03,
            ServerDeviceFailure => 0x04,
            Acknowledge => 0x05,
            ServerDeviceBusy => 0x06,
            MemoryParityError => 0x08,
        }
    }
}

impl ExceptionCode {
    pub(crate) fn description(&self) -> &str {
        use crate::frame::ExceptionCode::*;

        match *self {
            IllegalFunction => "Illegal function",
            IllegalDataAddress => "Illegal data address",
            IllegalDataValue => "Illegal data value",
            ServerDeviceFailure => "Server device failure",
            Acknowledge => "Acknowledge",
            ServerDeviceBusy => "Server device busy",
            MemoryParityError => "Memory parity error",
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl error::Error for ExceptionCode {}

/// A server (slave) exception response.
///
/// `function` is the raw function code of the request, which is not
/// necessarily a supported [`FunctionCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub function: u8,
    pub exception: ExceptionCode,
}

impl fmt::Display for ExceptionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Modbus function {}: {}", self.function, self.exception)
    }
}

impl error::Error for ExceptionResponse {}
