// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PDU encoding according to the Modbus application protocol.

use std::io::{self, Cursor};

use byteorder::{BigEndian, ReadBytesExt as _};
use bytes::{BufMut as _, Bytes, BytesMut};

use crate::{
    error::ProtocolError,
    frame::{Coil, Operation, Quantity, Response},
    ExceptionResponse, FunctionCode,
};

pub mod rtu;

/// Maximum request/response PDU size.
pub const MAX_PDU_SIZE: usize = 253;

const MAX_READ_COILS: Quantity = 2000;
const MAX_READ_REGISTERS: Quantity = 125;
const MAX_WRITE_COILS: Quantity = 1968;
const MAX_WRITE_REGISTERS: Quantity = 123;

/// Function code, address and quantity (or value).
const FIXED_PDU_LEN: usize = 5;

/// Function code, address, quantity and byte count.
const MULTIPLE_WRITE_HEADER_LEN: usize = 6;

#[allow(clippy::cast_possible_truncation)]
fn u8_len(len: usize) -> u8 {
    // The possible values are limited by the protocol.
    debug_assert!(len <= u8::MAX.into());
    len as u8
}

fn read_u16_be(rdr: &mut Cursor<&[u8]>) -> Result<u16, ProtocolError> {
    rdr.read_u16::<BigEndian>()
        .map_err(|_: io::Error| ProtocolError::IllegalDataValue)
}

fn expect_len(pdu: &[u8], len: usize) -> Result<(), ProtocolError> {
    if pdu.len() == len {
        Ok(())
    } else {
        Err(ProtocolError::IllegalDataValue)
    }
}

fn check_quantity(quantity: Quantity, max: Quantity) -> Result<(), ProtocolError> {
    if quantity == 0 || quantity > max {
        return Err(ProtocolError::IllegalDataValue);
    }
    Ok(())
}

fn check_address_range(address: u16, quantity: Quantity) -> Result<(), ProtocolError> {
    if u32::from(address) + u32::from(quantity) > 0x1_0000 {
        return Err(ProtocolError::IllegalDataAddress);
    }
    Ok(())
}

fn read_range(
    rdr: &mut Cursor<&[u8]>,
    max: Quantity,
) -> Result<(u16, Quantity), ProtocolError> {
    let address = read_u16_be(rdr)?;
    let quantity = read_u16_be(rdr)?;
    check_quantity(quantity, max)?;
    check_address_range(address, quantity)?;
    Ok((address, quantity))
}

fn coil_to_bool(coil: u16) -> Result<Coil, ProtocolError> {
    match coil {
        0xFF00 => Ok(true),
        0x0000 => Ok(false),
        _ => Err(ProtocolError::IllegalDataValue),
    }
}

fn bool_to_coil(state: Coil) -> u16 {
    if state {
        0xFF00
    } else {
        0x0000
    }
}

/// Decode a request PDU into an [`Operation`].
///
/// The function code is checked first, then the exact length its payload
/// shape requires, then quantities and the addressed range.
pub fn decode_operation(pdu: &[u8]) -> Result<Operation, ProtocolError> {
    use crate::frame::Operation::*;

    let Some(&fn_code) = pdu.first() else {
        return Err(ProtocolError::IllegalDataValue);
    };
    let function =
        FunctionCode::new(fn_code).ok_or(ProtocolError::IllegalFunction(fn_code))?;
    let rdr = &mut Cursor::new(&pdu[1..]);
    let operation = match function {
        FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => {
            expect_len(pdu, FIXED_PDU_LEN)?;
            let (address, quantity) = read_range(rdr, MAX_READ_COILS)?;
            if function == FunctionCode::ReadCoils {
                ReadCoils(address, quantity)
            } else {
                ReadDiscreteInputs(address, quantity)
            }
        }
        FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => {
            expect_len(pdu, FIXED_PDU_LEN)?;
            let (address, quantity) = read_range(rdr, MAX_READ_REGISTERS)?;
            if function == FunctionCode::ReadHoldingRegisters {
                ReadHoldingRegisters(address, quantity)
            } else {
                ReadInputRegisters(address, quantity)
            }
        }
        FunctionCode::WriteSingleCoil => {
            expect_len(pdu, FIXED_PDU_LEN)?;
            WriteSingleCoil(read_u16_be(rdr)?, coil_to_bool(read_u16_be(rdr)?)?)
        }
        FunctionCode::WriteSingleRegister => {
            expect_len(pdu, FIXED_PDU_LEN)?;
            WriteSingleRegister(read_u16_be(rdr)?, read_u16_be(rdr)?)
        }
        FunctionCode::WriteMultipleCoils => {
            let (address, quantity, payload) = multiple_write_payload(pdu, rdr)?;
            check_quantity(quantity, MAX_WRITE_COILS)?;
            if payload.len() != packed_coils_size(quantity.into()) {
                return Err(ProtocolError::IllegalDataValue);
            }
            check_address_range(address, quantity)?;
            WriteMultipleCoils(address, decode_packed_coils(payload, quantity))
        }
        FunctionCode::WriteMultipleRegisters => {
            let (address, quantity, payload) = multiple_write_payload(pdu, rdr)?;
            check_quantity(quantity, MAX_WRITE_REGISTERS)?;
            if payload.len() != usize::from(quantity) * 2 {
                return Err(ProtocolError::IllegalDataValue);
            }
            check_address_range(address, quantity)?;
            let words = payload
                .chunks_exact(2)
                .map(|w| u16::from_be_bytes([w[0], w[1]]))
                .collect();
            WriteMultipleRegisters(address, words)
        }
    };
    Ok(operation)
}

/// Address, quantity and the values following the byte count.
///
/// The byte count must cover exactly the rest of the PDU.
fn multiple_write_payload<'a>(
    pdu: &'a [u8],
    rdr: &mut Cursor<&[u8]>,
) -> Result<(u16, Quantity, &'a [u8]), ProtocolError> {
    if pdu.len() < MULTIPLE_WRITE_HEADER_LEN {
        return Err(ProtocolError::IllegalDataValue);
    }
    let address = read_u16_be(rdr)?;
    let quantity = read_u16_be(rdr)?;
    let byte_count = usize::from(pdu[MULTIPLE_WRITE_HEADER_LEN - 1]);
    expect_len(pdu, MULTIPLE_WRITE_HEADER_LEN + byte_count)?;
    Ok((address, quantity, &pdu[MULTIPLE_WRITE_HEADER_LEN..]))
}

/// Encode a successful response PDU.
#[must_use]
pub fn encode_response_pdu(rsp: &Response) -> Bytes {
    use crate::frame::Response::*;

    let mut buf = BytesMut::with_capacity(MAX_PDU_SIZE);
    buf.put_u8(rsp.function_code().value());
    match rsp {
        ReadCoils(coils) | ReadDiscreteInputs(coils) => {
            buf.put_u8(u8_len(packed_coils_size(coils.len())));
            encode_packed_coils(&mut buf, coils);
        }
        ReadHoldingRegisters(registers) | ReadInputRegisters(registers) => {
            buf.put_u8(u8_len(registers.len() * 2));
            for r in registers {
                buf.put_u16(*r);
            }
        }
        WriteSingleCoil(address, state) => {
            buf.put_u16(*address);
            buf.put_u16(bool_to_coil(*state));
        }
        WriteSingleRegister(address, word) => {
            buf.put_u16(*address);
            buf.put_u16(*word);
        }
        WriteMultipleCoils(address, quantity) | WriteMultipleRegisters(address, quantity) => {
            buf.put_u16(*address);
            buf.put_u16(*quantity);
        }
    }
    buf.freeze()
}

/// Encode `[function | 0x80, exception]`.
#[must_use]
pub fn encode_exception_response_pdu(rsp: ExceptionResponse) -> Bytes {
    let mut buf = BytesMut::with_capacity(2);
    buf.put_u8(rsp.function | 0x80);
    buf.put_u8(rsp.exception.into());
    buf.freeze()
}

fn packed_coils_size(count: usize) -> usize {
    (count + 7) / 8
}

fn encode_packed_coils(buf: &mut BytesMut, coils: &[Coil]) -> usize {
    let packed_coils_size = packed_coils_size(coils.len());
    let offset = buf.len();
    buf.resize(offset + packed_coils_size, 0);
    let buf = &mut buf[offset..];
    for (i, b) in coils.iter().enumerate() {
        let v = u8::from(*b); // 0 or 1
        buf[i / 8] |= v << (i % 8);
    }
    packed_coils_size
}

fn decode_packed_coils(bytes: &[u8], count: u16) -> Vec<Coil> {
    let mut res = Vec::with_capacity(count.into());
    for i in 0usize..count.into() {
        res.push((bytes[i / 8] >> (i % 8)) & 0b1 > 0);
    }
    res
}
