// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A [Modbus](https://en.wikipedia.org/wiki/Modbus) RTU server (slave)
//! based on [tokio](https://tokio.rs).
//!
//! Application code supplies behavior by registering handlers in a
//! [`RouteTable`](route::RouteTable). Each rule selects the slave ids,
//! function codes and addresses it serves; omitted filters match any value.
//! The [`Server`](server::Server) then answers requests from a serial line
//! one at a time.
//!
//! ```no_run
//! use modbus_rtu_server::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run<T: Transport>(transport: T) {
//! let mut routes = RouteTable::new();
//! routes.route(
//!     Some(&[1]),
//!     Some(&[FunctionCode::ReadCoils, FunctionCode::ReadHoldingRegisters]),
//!     None,
//!     |_| Ok(0),
//! );
//! routes.route(
//!     Some(&[1]),
//!     Some(&[FunctionCode::WriteSingleCoil, FunctionCode::WriteSingleRegister]),
//!     Some(&(0..10).collect::<Vec<_>>()[..]),
//!     |req| {
//!         log::info!("write {:?} to {}", req.value, req.address);
//!         Ok(0)
//!     },
//! );
//!
//! let server = Server::new(transport, routes, Config::for_baud_rate(115_200));
//! let shutdown = CancellationToken::new();
//! server.serve_until(shutdown).await;
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod prelude;
pub mod route;
pub mod server;
pub mod transport;

mod frame;
mod slave;

pub use self::{
    frame::{
        Address, Coil, ExceptionCode, ExceptionResponse, FunctionCode, Operation, Quantity,
        Response, Word,
    },
    slave::{Slave, SlaveId},
};
