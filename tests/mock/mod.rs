// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use modbus_rtu_server::{codec::rtu::encode, prelude::*};

/// Build a request frame with a valid checksum.
pub fn request(slave: SlaveId, pdu: &[u8]) -> Bytes {
    encode(slave, pdu)
}

/// Build a request frame and flip a bit of its checksum.
pub fn corrupted_request(slave: SlaveId, pdu: &[u8]) -> Bytes {
    let mut frame = request(slave, pdu).to_vec();
    if let Some(last) = frame.last_mut() {
        *last ^= 0x01;
    }
    frame.into()
}

/// What the next call of `read_frame` yields.
#[derive(Debug)]
pub enum Step {
    Frame(Bytes),
    Idle,
    Fail(io::ErrorKind),
}

#[derive(Debug, Default)]
struct Recording {
    reads: usize,
    written: Vec<Bytes>,
}

/// Observes a [`MockTransport`] after it has been moved into a server.
#[derive(Debug, Default, Clone)]
pub struct Recorder(Arc<Mutex<Recording>>);

impl Recorder {
    pub fn reads(&self) -> usize {
        self.0.lock().unwrap().reads
    }

    pub fn written(&self) -> Vec<Bytes> {
        self.0.lock().unwrap().written.clone()
    }
}

/// Replays scripted frames and reports end of stream afterwards.
#[derive(Debug)]
pub struct MockTransport {
    steps: VecDeque<Step>,
    recorder: Recorder,
    cancel_on_read: Option<(usize, CancellationToken)>,
}

impl MockTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> (Self, Recorder) {
        let recorder = Recorder::default();
        let transport = Self {
            steps: steps.into_iter().collect(),
            recorder: recorder.clone(),
            cancel_on_read: None,
        };
        (transport, recorder)
    }

    pub fn with_frames(frames: impl IntoIterator<Item = Bytes>) -> (Self, Recorder) {
        Self::new(frames.into_iter().map(Step::Frame))
    }

    /// Cancel `token` while delivering the `nth` read (starting at 1).
    pub fn cancel_on_read(mut self, nth: usize, token: CancellationToken) -> Self {
        self.cancel_on_read = Some((nth, token));
        self
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn read_frame(
        &mut self,
        _timeout: Duration,
        _inter_char_timeout: Duration,
    ) -> io::Result<Option<Bytes>> {
        let reads = {
            let mut recording = self.recorder.0.lock().unwrap();
            recording.reads += 1;
            recording.reads
        };
        if let Some((nth, token)) = &self.cancel_on_read {
            if *nth == reads {
                token.cancel();
            }
        }
        match self.steps.pop_front() {
            Some(Step::Frame(frame)) => Ok(Some(frame)),
            Some(Step::Idle) => Ok(None),
            Some(Step::Fail(kind)) => Err(kind.into()),
            None => Err(io::ErrorKind::UnexpectedEof.into()),
        }
    }

    async fn write(&mut self, frame: &[u8]) -> io::Result<()> {
        self.recorder
            .0
            .lock()
            .unwrap()
            .written
            .push(Bytes::copy_from_slice(frame));
        Ok(())
    }
}
