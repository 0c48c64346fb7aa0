// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Frame level access to the serial line.

use std::{io, time::Duration};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use log::trace;
use tokio::{
    io::{AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _},
    time,
};

use crate::codec::rtu::MAX_ADU_LEN;

/// Read size while discarding the tail of an oversized frame.
const DRAIN_CHUNK_LEN: usize = 64;

/// Delivers complete inbound frames and writes outbound ones.
#[async_trait]
pub trait Transport: Send {
    /// Wait up to `timeout` for a frame to start and return it once the line
    /// has been silent for `inter_char_timeout`.
    ///
    /// Returns `Ok(None)` if no frame started in time. End of stream is
    /// reported as [`io::ErrorKind::UnexpectedEof`].
    async fn read_frame(
        &mut self,
        timeout: Duration,
        inter_char_timeout: Duration,
    ) -> io::Result<Option<Bytes>>;

    async fn write(&mut self, frame: &[u8]) -> io::Result<()>;
}

#[async_trait]
impl<T> Transport for Box<T>
where
    T: Transport + ?Sized,
{
    async fn read_frame(
        &mut self,
        timeout: Duration,
        inter_char_timeout: Duration,
    ) -> io::Result<Option<Bytes>> {
        (**self).read_frame(timeout, inter_char_timeout).await
    }

    async fn write(&mut self, frame: &[u8]) -> io::Result<()> {
        (**self).write(frame).await
    }
}

/// Silence delimited framing on top of any byte stream.
#[derive(Debug)]
pub struct StreamTransport<T> {
    io: T,
}

impl<T> StreamTransport<T> {
    pub fn new(io: T) -> Self {
        Self { io }
    }

    pub fn into_inner(self) -> T {
        self.io
    }
}

#[cfg(feature = "rtu-server")]
impl StreamTransport<tokio_serial::SerialStream> {
    /// Open the serial port at `path` with `baud_rate` and default line settings.
    pub fn open<P: AsRef<std::path::Path>>(path: P, baud_rate: u32) -> io::Result<Self> {
        let builder = tokio_serial::new(path.as_ref().to_string_lossy(), baud_rate);
        let serial = tokio_serial::SerialStream::open(&builder)?;
        Ok(Self::new(serial))
    }
}

#[async_trait]
impl<T> Transport for StreamTransport<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_frame(
        &mut self,
        timeout: Duration,
        inter_char_timeout: Duration,
    ) -> io::Result<Option<Bytes>> {
        // One byte beyond the ADU limit is kept so decoding reports the frame as too long.
        let mut buf = BytesMut::with_capacity(MAX_ADU_LEN + 1);
        let Ok(first) = time::timeout(timeout, self.io.read_buf(&mut buf)).await else {
            return Ok(None);
        };
        if first? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        let mut scratch = [0; DRAIN_CHUNK_LEN];
        let mut discarded = 0;
        loop {
            if buf.len() > MAX_ADU_LEN + 1 {
                discarded += buf.len() - (MAX_ADU_LEN + 1);
                buf.truncate(MAX_ADU_LEN + 1);
            }
            // Oversized frames are drained to the end so the next one starts clean.
            let draining = buf.len() > MAX_ADU_LEN;
            let read = if draining {
                time::timeout(inter_char_timeout, self.io.read(&mut scratch)).await
            } else {
                time::timeout(inter_char_timeout, self.io.read_buf(&mut buf)).await
            };
            match read {
                Err(_) | Ok(Ok(0)) => break,
                Ok(Ok(len)) if draining => discarded += len,
                Ok(Ok(_)) => continue,
                Ok(Err(err)) => return Err(err),
            }
        }
        if discarded > 0 {
            trace!("Discarded {discarded} bytes of an oversized frame");
        }
        Ok(Some(buf.freeze()))
    }

    async fn write(&mut self, frame: &[u8]) -> io::Result<()> {
        self.io.write_all(frame).await?;
        self.io.flush().await
    }
}
