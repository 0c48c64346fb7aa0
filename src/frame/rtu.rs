// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use bytes::Bytes;

use crate::{codec, error::FramingError, Slave};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Header {
    pub(crate) slave: Slave,
}

/// An inbound frame with a verified checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestAdu {
    pub(crate) hdr: Header,
    pub(crate) pdu: Bytes,
}

impl TryFrom<&[u8]> for RequestAdu {
    type Error = FramingError;

    fn try_from(raw: &[u8]) -> Result<Self, Self::Error> {
        let (slave_id, pdu) = codec::rtu::decode(raw)?;
        Ok(Self {
            hdr: Header {
                slave: slave_id.into(),
            },
            pdu,
        })
    }
}

/// An outbound frame, answered under the header of its request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResponseAdu {
    pub(crate) hdr: Header,
    pub(crate) pdu: Bytes,
}

impl ResponseAdu {
    pub(crate) fn encode(&self) -> Bytes {
        codec::rtu::encode(self.hdr.slave.into(), &self.pdu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_adu_from_valid_frame() {
        // Given
        let raw = [0x01, 0x03, 0x08, 0x2B, 0x00, 0x02, 0xB6, 0x63];

        // When
        let adu = RequestAdu::try_from(&raw[..]).unwrap();

        // Then
        assert_eq!(adu.hdr.slave, Slave(1));
        assert_eq!(&adu.pdu[..], &[0x03, 0x08, 0x2B, 0x00, 0x02]);
    }

    #[test]
    fn request_adu_from_corrupted_frame() {
        let raw = [0x01, 0x03, 0x08, 0x2B, 0x00, 0x02, 0xB6, 0x64];
        assert!(matches!(
            RequestAdu::try_from(&raw[..]),
            Err(FramingError::BadChecksum { .. })
        ));
    }

    #[test]
    fn response_adu_keeps_request_header() {
        let hdr = Header { slave: Slave(0x11) };
        let rsp = ResponseAdu {
            hdr,
            pdu: Bytes::from_static(&[0x86, 0x04]),
        };
        let raw = rsp.encode();
        let req = RequestAdu::try_from(&raw[..]).unwrap();
        assert_eq!(req.hdr, hdr);
        assert_eq!(req.pdu, rsp.pdu);
    }
}
