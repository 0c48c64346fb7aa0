// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing of addressed items to application handlers.
//!
//! A [`RouteTable`] is filled during setup and then handed over to the
//! server, which only reads from it. Rules are matched in registration order
//! and the first matching rule wins.

use std::{
    any::Any,
    collections::HashSet,
    fmt,
    hash::Hash,
    panic::{self, AssertUnwindSafe},
};

use crate::{
    error::HandlerError,
    frame::{Address, Word},
    FunctionCode, SlaveId,
};

/// A single addressed item of a request, as seen by a [`Handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteRequest {
    pub slave: SlaveId,
    pub function: FunctionCode,
    pub address: Address,
    /// The new value for write functions, `None` for reads.
    ///
    /// Coils are passed as `1` (on) or `0` (off).
    pub value: Option<Word>,
}

/// The current value of the item for reads. Ignored for writes.
///
/// Coil and discrete input reads treat any non-zero word as on.
pub type HandlerResult = Result<Word, HandlerError>;

/// Application code serving the items selected by a [`RouteRule`].
pub trait Handler: Send + Sync {
    fn call(&self, req: &RouteRequest) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&RouteRequest) -> HandlerResult + Send + Sync,
{
    fn call(&self, req: &RouteRequest) -> HandlerResult {
        self(req)
    }
}

/// Accepts either any value (`None`) or only the listed ones.
type Filter<T> = Option<HashSet<T>>;

fn filter_matches<T: Eq + Hash>(filter: &Filter<T>, value: &T) -> bool {
    filter.as_ref().map_or(true, |values| values.contains(value))
}

/// A handler together with the slave ids, function codes and addresses it
/// serves.
///
/// Omitted filters match any value.
pub struct RouteRule {
    slave_ids: Filter<SlaveId>,
    function_codes: Filter<FunctionCode>,
    addresses: Filter<Address>,
    handler: Box<dyn Handler>,
}

impl RouteRule {
    /// A rule that matches every request, served by a closure.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&RouteRequest) -> HandlerResult + Send + Sync + 'static,
    {
        Self::from_handler(handler)
    }

    /// A rule that matches every request, served by any [`Handler`].
    pub fn from_handler<H>(handler: H) -> Self
    where
        H: Handler + 'static,
    {
        Self {
            slave_ids: None,
            function_codes: None,
            addresses: None,
            handler: Box::new(handler),
        }
    }

    #[must_use]
    pub fn slave_ids(mut self, slave_ids: impl IntoIterator<Item = SlaveId>) -> Self {
        self.slave_ids = Some(slave_ids.into_iter().collect());
        self
    }

    #[must_use]
    pub fn function_codes(
        mut self,
        function_codes: impl IntoIterator<Item = FunctionCode>,
    ) -> Self {
        self.function_codes = Some(function_codes.into_iter().collect());
        self
    }

    #[must_use]
    pub fn addresses(mut self, addresses: impl IntoIterator<Item = Address>) -> Self {
        self.addresses = Some(addresses.into_iter().collect());
        self
    }

    #[must_use]
    pub fn matches(&self, slave: SlaveId, function: FunctionCode, address: Address) -> bool {
        filter_matches(&self.slave_ids, &slave)
            && filter_matches(&self.function_codes, &function)
            && filter_matches(&self.addresses, &address)
    }

    #[must_use]
    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for RouteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteRule")
            .field("slave_ids", &self.slave_ids)
            .field("function_codes", &self.function_codes)
            .field("addresses", &self.addresses)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of [`RouteRule`]s.
#[derive(Debug, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. Rules are never de-duplicated.
    pub fn register(&mut self, rule: RouteRule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    /// Register `handler` for the given filters, where `None` matches any
    /// value.
    ///
    /// ```
    /// use modbus_rtu_server::{prelude::*, route::RouteTable};
    ///
    /// let mut routes = RouteTable::new();
    /// routes.route(
    ///     Some(&[1]),
    ///     Some(&[FunctionCode::ReadCoils, FunctionCode::ReadHoldingRegisters]),
    ///     None,
    ///     |_| Ok(0),
    /// );
    /// assert_eq!(routes.len(), 1);
    /// ```
    pub fn route<F>(
        &mut self,
        slave_ids: Option<&[SlaveId]>,
        function_codes: Option<&[FunctionCode]>,
        addresses: Option<&[Address]>,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(&RouteRequest) -> HandlerResult + Send + Sync + 'static,
    {
        let mut rule = RouteRule::new(handler);
        if let Some(slave_ids) = slave_ids {
            rule = rule.slave_ids(slave_ids.iter().copied());
        }
        if let Some(function_codes) = function_codes {
            rule = rule.function_codes(function_codes.iter().copied());
        }
        if let Some(addresses) = addresses {
            rule = rule.addresses(addresses.iter().copied());
        }
        self.register(rule)
    }

    /// The handler of the first registered rule that matches.
    #[must_use]
    pub fn find_handler(
        &self,
        slave: SlaveId,
        function: FunctionCode,
        address: Address,
    ) -> Option<&dyn Handler> {
        self.rules
            .iter()
            .find(|rule| rule.matches(slave, function, address))
            .map(RouteRule::handler)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Call `handler`, turning a panic into [`HandlerError::Fault`].
pub fn invoke(handler: &dyn Handler, req: &RouteRequest) -> HandlerResult {
    panic::catch_unwind(AssertUnwindSafe(|| handler.call(req)))
        .unwrap_or_else(|payload| Err(HandlerError::fault(panic_message(&*payload))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("handler panicked: {msg}")
    } else {
        "handler panicked".to_owned()
    }
}
