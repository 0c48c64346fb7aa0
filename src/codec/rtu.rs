// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RTU framing: unit id, PDU and a trailing CRC-16 (Modbus) checksum.

use bytes::{BufMut as _, Bytes, BytesMut};

use crate::{error::FramingError, SlaveId};

/// Unit id, function code and checksum.
pub const MIN_ADU_LEN: usize = 1 + 1 + 2;

/// Unit id, the largest PDU and checksum.
pub const MAX_ADU_LEN: usize = 1 + super::MAX_PDU_SIZE + 2;

const CRC_LEN: usize = 2;

/// CRC-16 (Modbus) over `buf`.
///
/// The checksum is transmitted low byte first.
#[must_use]
pub fn calc_crc(buf: &[u8]) -> u16 {
    let mut crc = 0xFFFF;
    for x in buf {
        crc ^= u16::from(*x);
        for _ in 0..8 {
            if (crc & 0x0001) != 0 {
                crc >>= 1;
                crc ^= 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

fn trailing_crc(frame: &[u8]) -> u16 {
    let crc = &frame[frame.len() - CRC_LEN..];
    u16::from_le_bytes([crc[0], crc[1]])
}

/// Check the trailing checksum of a complete `frame`.
///
/// Frames shorter than the checksum itself never verify.
#[must_use]
pub fn verify(frame: &[u8]) -> bool {
    if frame.len() < CRC_LEN {
        return false;
    }
    calc_crc(&frame[..frame.len() - CRC_LEN]) == trailing_crc(frame)
}

/// Split a raw frame into unit id and PDU.
pub fn decode(raw: &[u8]) -> Result<(SlaveId, Bytes), FramingError> {
    if raw.len() < MIN_ADU_LEN {
        return Err(FramingError::TooShort(raw.len()));
    }
    if raw.len() > MAX_ADU_LEN {
        return Err(FramingError::TooLong(raw.len()));
    }
    let (adu, _) = raw.split_at(raw.len() - CRC_LEN);
    let expected = calc_crc(adu);
    let actual = trailing_crc(raw);
    if expected != actual {
        return Err(FramingError::BadChecksum { expected, actual });
    }
    Ok((adu[0], Bytes::copy_from_slice(&adu[1..])))
}

/// Assemble `slave_id || pdu || crc`.
#[must_use]
pub fn encode(slave_id: SlaveId, pdu: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + pdu.len() + CRC_LEN);
    buf.put_u8(slave_id);
    buf.put_slice(pdu);
    let crc = calc_crc(&buf);
    buf.put_u16_le(crc);
    buf.freeze()
}
