// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU server

mod dispatcher;
pub mod rtu;

pub use self::{
    dispatcher::Dispatcher,
    rtu::{Served, Server, Terminated},
};
