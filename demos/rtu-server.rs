// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RTU server example
//!
//! Serves a small in-memory data store as slave 1 until Ctrl-C is pressed:
//!
//! ```sh
//! RUST_LOG=debug cargo run --example rtu-server --features rtu-server -- /dev/ttyUSB0 19200
//! ```

use std::{
    collections::HashMap,
    env,
    sync::{Arc, Mutex},
};

use modbus_rtu_server::prelude::*;
use tokio_util::sync::CancellationToken;

type DataStore = Arc<Mutex<HashMap<u16, u16>>>;

fn routes(store: &DataStore) -> RouteTable {
    use FunctionCode::*;

    let addresses: Vec<_> = (0..10).collect();
    let mut routes = RouteTable::new();

    let reader = Arc::clone(store);
    routes.route(
        Some(&[1]),
        Some(&[ReadCoils, ReadHoldingRegisters]),
        Some(&addresses[..]),
        move |req| {
            let store = reader.lock().map_err(|err| HandlerError::fault(err.to_string()))?;
            Ok(store.get(&req.address).copied().unwrap_or_default())
        },
    );

    let writer = Arc::clone(store);
    routes.route(
        Some(&[1]),
        Some(&[WriteSingleCoil, WriteSingleRegister, WriteMultipleCoils, WriteMultipleRegisters]),
        Some(&addresses[..]),
        move |req| {
            let mut store = writer.lock().map_err(|err| HandlerError::fault(err.to_string()))?;
            store.insert(req.address, req.value.unwrap_or_default());
            Ok(0)
        },
    );

    routes
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "/dev/ttyUSB0".to_owned());
    let baud_rate = args.next().map(|arg| arg.parse()).transpose()?.unwrap_or(19200);

    let store = DataStore::default();
    let server = Server::new_from_path(&path, baud_rate, routes(&store))?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.cancel();
        }
    });

    println!("Serving slave 1 on {path} at {baud_rate} baud...");
    let terminated = server.serve_until(shutdown).await;
    println!("Server stopped: {terminated:?}");
    Ok(())
}
