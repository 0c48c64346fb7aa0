// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types and traits

///////////////////////////////////////////////////////////////////
/// Types
///////////////////////////////////////////////////////////////////
pub use crate::{
    config::Config,
    error::{HandlerError, ProtocolError},
    route::{HandlerResult, RouteRequest, RouteRule, RouteTable},
    server::{Served, Server, Terminated},
    transport::StreamTransport,
    ExceptionCode, FunctionCode, Slave, SlaveId,
};

///////////////////////////////////////////////////////////////////
/// Traits
///////////////////////////////////////////////////////////////////
pub use crate::{route::Handler, transport::Transport};
