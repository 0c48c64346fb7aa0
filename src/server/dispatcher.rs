// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution of decoded operations against the route table.

use bytes::Bytes;
use log::{debug, error};

use crate::{
    codec::{decode_operation, encode_exception_response_pdu, encode_response_pdu},
    error::{DispatchError, HandlerError, ProtocolError},
    frame::{Address, Operation, Quantity, Response, Word},
    route::{invoke, Handler, RouteRequest, RouteTable},
    ExceptionCode, ExceptionResponse, FunctionCode, SlaveId,
};

/// Turns request PDUs into response PDUs.
///
/// Every request gets an answer: invalid requests and failing handlers
/// produce exception responses.
#[derive(Debug)]
pub struct Dispatcher {
    routes: RouteTable,
}

impl Dispatcher {
    #[must_use]
    pub fn new(routes: RouteTable) -> Self {
        Self { routes }
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Decode, execute and encode a single request PDU.
    #[must_use]
    pub fn process(&self, slave: SlaveId, request_pdu: &[u8]) -> Bytes {
        let function = request_pdu.first().copied().unwrap_or_default();
        let result = decode_operation(request_pdu)
            .map_err(DispatchError::from)
            .and_then(|operation| self.execute(slave, &operation));
        match result {
            Ok(rsp) => encode_response_pdu(&rsp),
            Err(err) => {
                let exception = exception_code(slave, function, err);
                encode_exception_response_pdu(ExceptionResponse {
                    function,
                    exception,
                })
            }
        }
    }

    /// Resolve a handler for every addressed item, then invoke them in
    /// address order.
    ///
    /// No handler is invoked unless all addresses are routed.
    pub fn execute(&self, slave: SlaveId, operation: &Operation) -> Result<Response, DispatchError> {
        use crate::frame::Operation::*;

        let function = operation.function_code();
        let start = operation.address();
        let handlers = self.resolve(slave, function, start, operation.quantity())?;
        let rsp = match operation {
            ReadCoils(_, _) => Response::ReadCoils(read_coils(slave, function, &handlers)?),
            ReadDiscreteInputs(_, _) => {
                Response::ReadDiscreteInputs(read_coils(slave, function, &handlers)?)
            }
            ReadHoldingRegisters(_, _) => {
                Response::ReadHoldingRegisters(read_words(slave, function, &handlers)?)
            }
            ReadInputRegisters(_, _) => {
                Response::ReadInputRegisters(read_words(slave, function, &handlers)?)
            }
            WriteSingleCoil(address, state) => {
                write(slave, function, &handlers, [Word::from(*state)])?;
                Response::WriteSingleCoil(*address, *state)
            }
            WriteSingleRegister(address, word) => {
                write(slave, function, &handlers, [*word])?;
                Response::WriteSingleRegister(*address, *word)
            }
            WriteMultipleCoils(address, coils) => {
                write(slave, function, &handlers, coils.iter().map(|c| Word::from(*c)))?;
                Response::WriteMultipleCoils(*address, operation.quantity())
            }
            WriteMultipleRegisters(address, words) => {
                write(slave, function, &handlers, words.iter().copied())?;
                Response::WriteMultipleRegisters(*address, operation.quantity())
            }
        };
        Ok(rsp)
    }

    fn resolve(
        &self,
        slave: SlaveId,
        function: FunctionCode,
        start: Address,
        quantity: Quantity,
    ) -> Result<Vec<(Address, &dyn Handler)>, ProtocolError> {
        (0..quantity)
            .map(|offset| {
                let address = start
                    .checked_add(offset)
                    .ok_or(ProtocolError::IllegalDataAddress)?;
                let handler = self
                    .routes
                    .find_handler(slave, function, address)
                    .ok_or(ProtocolError::IllegalDataAddress)?;
                Ok((address, handler))
            })
            .collect()
    }
}

fn exception_code(slave: SlaveId, function: u8, err: DispatchError) -> ExceptionCode {
    match err {
        DispatchError::Protocol(err) => {
            debug!("Rejecting request for function {function} from slave {slave}: {err}");
            err.exception_code()
        }
        DispatchError::Handler(HandlerError::Exception(exception)) => {
            debug!("Handler rejected function {function} for slave {slave}: {exception}");
            exception
        }
        DispatchError::Handler(HandlerError::Fault(fault)) => {
            error!("Could not handle function {function} for slave {slave}: {fault}");
            ExceptionCode::ServerDeviceFailure
        }
    }
}

fn read_words(
    slave: SlaveId,
    function: FunctionCode,
    handlers: &[(Address, &dyn Handler)],
) -> Result<Vec<Word>, HandlerError> {
    handlers
        .iter()
        .map(|(address, handler)| {
            let req = RouteRequest {
                slave,
                function,
                address: *address,
                value: None,
            };
            invoke(*handler, &req)
        })
        .collect()
}

fn read_coils(
    slave: SlaveId,
    function: FunctionCode,
    handlers: &[(Address, &dyn Handler)],
) -> Result<Vec<bool>, HandlerError> {
    let words = read_words(slave, function, handlers)?;
    Ok(words.into_iter().map(|word| word != 0).collect())
}

fn write(
    slave: SlaveId,
    function: FunctionCode,
    handlers: &[(Address, &dyn Handler)],
    values: impl IntoIterator<Item = Word>,
) -> Result<(), HandlerError> {
    for ((address, handler), value) in handlers.iter().zip(values) {
        let req = RouteRequest {
            slave,
            function,
            address: *address,
            value: Some(value),
        };
        invoke(*handler, &req)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::route::{HandlerResult, RouteRule};

    type Log = Arc<Mutex<Vec<RouteRequest>>>;

    fn recording(log: &Log, value: Word) -> impl Fn(&RouteRequest) -> HandlerResult + Send + Sync {
        let log = Arc::clone(log);
        move |req| {
            log.lock().unwrap().push(*req);
            Ok(value)
        }
    }

    fn registers(values: &'static [Word]) -> impl Fn(&RouteRequest) -> HandlerResult + Send + Sync {
        move |req| Ok(values[usize::from(req.address)])
    }

    #[test]
    fn read_holding_registers() {
        let mut routes = RouteTable::new();
        routes.route(
            None,
            Some(&[FunctionCode::ReadHoldingRegisters]),
            None,
            registers(&[0x0001, 0x0002]),
        );
        let dispatcher = Dispatcher::new(routes);

        let rsp = dispatcher.process(1, &[0x03, 0x00, 0x00, 0x00, 0x02]);

        assert_eq!(&rsp[..], &[3, 4, 0x00, 0x01, 0x00, 0x02]);
    }

    #[test]
    fn read_input_registers() {
        let mut routes = RouteTable::new();
        routes.route(None, None, None, registers(&[0, 0xAA00, 0xCCBB]));
        let dispatcher = Dispatcher::new(routes);

        let rsp = dispatcher.process(1, &[0x04, 0x00, 0x01, 0x00, 0x02]);

        assert_eq!(&rsp[..], &[4, 4, 0xAA, 0x00, 0xCC, 0xBB]);
    }

    #[test]
    fn read_coils_packs_bits() {
        let mut routes = RouteTable::new();
        routes.route(None, None, None, registers(&[1, 0, 0, 7, 0, 0, 0, 0, 1, 0]));
        let dispatcher = Dispatcher::new(routes);

        let rsp = dispatcher.process(1, &[0x01, 0x00, 0x00, 0x00, 0x0A]);
        assert_eq!(&rsp[..], &[1, 2, 0b_0000_1001, 0b_0000_0001]);

        let rsp = dispatcher.process(1, &[0x02, 0x00, 0x03, 0x00, 0x01]);
        assert_eq!(&rsp[..], &[2, 1, 0b_0000_0001]);
    }

    #[test]
    fn unsupported_function_code() {
        let dispatcher = Dispatcher::new(RouteTable::new());
        let rsp = dispatcher.process(1, &[99, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(&rsp[..], &[99 | 0x80, 1]);
    }

    #[test]
    fn malformed_request() {
        let dispatcher = Dispatcher::new(RouteTable::new());
        let rsp = dispatcher.process(1, &[0x06, 0x00, 0x01, 0x00]);
        assert_eq!(&rsp[..], &[0x86, 3]);
    }

    #[test]
    fn unrouted_address() {
        let log = Log::default();
        let mut routes = RouteTable::new();
        routes.route(Some(&[1]), None, Some(&[0, 1]), recording(&log, 0));
        let dispatcher = Dispatcher::new(routes);

        let rsp = dispatcher.process(1, &[0x03, 0x00, 0x00, 0x00, 0x03]);
        assert_eq!(&rsp[..], &[0x83, 2]);

        let rsp = dispatcher.process(2, &[0x03, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(&rsp[..], &[0x83, 2]);

        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn write_single_register() {
        let log = Log::default();
        let mut routes = RouteTable::new();
        routes.route(
            Some(&[1]),
            Some(&[FunctionCode::WriteSingleCoil, FunctionCode::WriteSingleRegister]),
            Some(&(0..10).collect::<Vec<_>>()[..]),
            recording(&log, 0xDEAD),
        );
        let dispatcher = Dispatcher::new(routes);

        let rsp = dispatcher.process(1, &[0x06, 0x00, 0x07, 0xAB, 0xCD]);

        assert_eq!(&rsp[..], &[0x06, 0x00, 0x07, 0xAB, 0xCD]);
        assert_eq!(
            *log.lock().unwrap(),
            vec![RouteRequest {
                slave: 1,
                function: FunctionCode::WriteSingleRegister,
                address: 7,
                value: Some(0xABCD),
            }]
        );
    }

    #[test]
    fn write_single_coil() {
        let log = Log::default();
        let mut routes = RouteTable::new();
        routes.route(None, None, None, recording(&log, 0));
        let dispatcher = Dispatcher::new(routes);

        let rsp = dispatcher.process(1, &[0x05, 0x00, 0x03, 0xFF, 0x00]);

        assert_eq!(&rsp[..], &[0x05, 0x00, 0x03, 0xFF, 0x00]);
        assert_eq!(log.lock().unwrap()[0].value, Some(1));
    }

    #[test]
    fn write_multiple_coils() {
        let log = Log::default();
        let mut routes = RouteTable::new();
        routes.route(None, None, None, recording(&log, 0));
        let dispatcher = Dispatcher::new(routes);

        let rsp = dispatcher.process(1, &[0x0F, 0x00, 0x10, 0x00, 0x03, 0x01, 0b_101]);

        assert_eq!(&rsp[..], &[0x0F, 0x00, 0x10, 0x00, 0x03]);
        let writes: Vec<_> = log
            .lock()
            .unwrap()
            .iter()
            .map(|req| (req.address, req.value))
            .collect();
        assert_eq!(writes, vec![(0x10, Some(1)), (0x11, Some(0)), (0x12, Some(1))]);
    }

    #[test]
    fn write_multiple_registers() {
        let log = Log::default();
        let mut routes = RouteTable::new();
        routes.route(None, None, None, recording(&log, 0));
        let dispatcher = Dispatcher::new(routes);

        let rsp = dispatcher.process(
            1,
            &[0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02],
        );

        assert_eq!(&rsp[..], &[0x10, 0x00, 0x01, 0x00, 0x02]);
        let writes: Vec<_> = log
            .lock()
            .unwrap()
            .iter()
            .map(|req| (req.address, req.value))
            .collect();
        assert_eq!(writes, vec![(1, Some(0x000A)), (2, Some(0x0102))]);
    }

    #[test]
    fn partially_routed_write_invokes_nothing() {
        let log = Log::default();
        let mut routes = RouteTable::new();
        routes.route(None, None, Some(&[1]), recording(&log, 0));
        let dispatcher = Dispatcher::new(routes);

        let rsp = dispatcher.process(
            1,
            &[0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02],
        );

        assert_eq!(&rsp[..], &[0x90, 2]);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn handler_fault() {
        let mut routes = RouteTable::new();
        routes.route(None, None, None, |_| Err(HandlerError::fault("bus error")));
        let dispatcher = Dispatcher::new(routes);

        let rsp = dispatcher.process(1, &[0x06, 0x00, 0x01, 0x00, 0x02]);

        assert_eq!(&rsp[..], &[6 | 0x80, 4]);
    }

    #[test]
    fn handler_panic() {
        let mut routes = RouteTable::new();
        routes.route(None, None, None, |_| panic!("unexpected"));
        let dispatcher = Dispatcher::new(routes);

        let rsp = dispatcher.process(1, &[0x03, 0x00, 0x01, 0x00, 0x01]);

        assert_eq!(&rsp[..], &[0x83, 4]);
    }

    #[test]
    fn handler_exception() {
        let mut routes = RouteTable::new();
        routes.route(None, None, None, |_| {
            Err(ExceptionCode::ServerDeviceBusy.into())
        });
        let dispatcher = Dispatcher::new(routes);

        let rsp = dispatcher.process(1, &[0x04, 0x00, 0x01, 0x00, 0x01]);

        assert_eq!(&rsp[..], &[0x84, 6]);
    }

    #[test]
    fn first_registered_rule_wins() {
        let mut routes = RouteTable::new();
        routes
            .register(RouteRule::new(|_| Ok(1)).slave_ids([1]))
            .register(RouteRule::new(|_| Ok(2)));
        let dispatcher = Dispatcher::new(routes);

        let rsp = dispatcher.process(1, &[0x03, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(&rsp[..], &[3, 2, 0x00, 0x01]);

        let rsp = dispatcher.process(2, &[0x03, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(&rsp[..], &[3, 2, 0x00, 0x02]);
    }

    #[test]
    fn execute_rejects_range_beyond_address_space() {
        let mut routes = RouteTable::new();
        routes.route(None, None, None, |_| Ok(0));
        let dispatcher = Dispatcher::new(routes);

        let res = dispatcher.execute(1, &Operation::ReadHoldingRegisters(0xFFFF, 2));

        assert!(matches!(
            res,
            Err(DispatchError::Protocol(ProtocolError::IllegalDataAddress))
        ));
    }
}
