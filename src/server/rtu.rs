// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU serve loop

use std::io;

use bytes::Bytes;
use log::{debug, trace, warn};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    error::FramingError,
    frame::rtu::{RequestAdu, ResponseAdu},
    route::RouteTable,
    server::Dispatcher,
    transport::Transport,
};

/// Why the serve loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminated {
    /// The transport reached end of stream.
    Finished,

    /// The shutdown token was cancelled.
    Aborted,
}

/// Outcome of a single iteration of the serve loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Served {
    /// No frame arrived within the configured timeout.
    Idle,

    /// The frame was corrupted and dropped without a response.
    Dropped(FramingError),

    /// A broadcast request was executed without a response.
    Broadcast,

    /// The response frame that has been written.
    Responded(Bytes),
}

/// A Modbus RTU server answering requests from a single serial line.
#[derive(Debug)]
pub struct Server<T> {
    transport: T,
    dispatcher: Dispatcher,
    config: Config,
}

#[cfg(feature = "rtu-server")]
impl Server<crate::transport::StreamTransport<tokio_serial::SerialStream>> {
    /// set up a new Server instance from an interface path and baud rate
    pub fn new_from_path<P: AsRef<std::path::Path>>(
        p: P,
        baud_rate: u32,
        routes: RouteTable,
    ) -> io::Result<Self> {
        let transport = crate::transport::StreamTransport::open(p, baud_rate)?;
        Ok(Self::new(transport, routes, Config::for_baud_rate(baud_rate)))
    }
}

impl<T> Server<T>
where
    T: Transport,
{
    /// The route table is owned by the server from now on and can no longer
    /// be modified.
    #[must_use]
    pub fn new(transport: T, routes: RouteTable, config: Config) -> Self {
        Self {
            transport,
            dispatcher: Dispatcher::new(routes),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Receive, process and answer a single request.
    ///
    /// Corrupted frames are dropped silently. Errors are only returned if
    /// the transport fails.
    pub async fn serve_once(&mut self) -> io::Result<Served> {
        let Config {
            timeout,
            inter_char_timeout,
            broadcast_responses,
        } = self.config;
        let Some(raw) = self.transport.read_frame(timeout, inter_char_timeout).await? else {
            return Ok(Served::Idle);
        };
        debug!("<-- {:02X?}", &raw[..]);

        let request = match RequestAdu::try_from(&raw[..]) {
            Ok(request) => request,
            Err(err) => {
                warn!("Dropping request frame: {err}");
                return Ok(Served::Dropped(err));
            }
        };

        let RequestAdu { hdr, pdu } = request;
        let pdu = self.dispatcher.process(hdr.slave.into(), &pdu);
        if hdr.slave.is_broadcast() && !broadcast_responses {
            trace!("Skipping response to broadcast request");
            return Ok(Served::Broadcast);
        }

        let response = ResponseAdu { hdr, pdu }.encode();
        debug!("--> {:02X?}", &response[..]);
        self.transport.write(&response).await?;
        Ok(Served::Responded(response))
    }

    /// serve Modbus RTU requests until the transport is exhausted
    pub async fn serve_forever(self) -> Terminated {
        self.serve_until(CancellationToken::new()).await
    }

    /// serve Modbus RTU requests until the transport is exhausted or `shutdown` is cancelled
    ///
    /// Cancellation is checked between requests, i.e. a request that has
    /// already been received is always answered first. After a transport
    /// error the loop pauses for [`Config::timeout`] or until cancelled.
    pub async fn serve_until(mut self, shutdown: CancellationToken) -> Terminated {
        loop {
            if shutdown.is_cancelled() {
                debug!("Shutdown signal received");
                return Terminated::Aborted;
            }
            match self.serve_once().await {
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!("Transport exhausted");
                    return Terminated::Finished;
                }
                Err(err) => {
                    warn!("Transport error: {err}");
                    // Back off until the next attempt or shutdown.
                    tokio::select! {
                        () = shutdown.cancelled() => {}
                        () = time::sleep(self.config.timeout) => {}
                    }
                }
            }
        }
    }
}
