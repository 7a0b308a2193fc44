// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

/// Result slot for a store write that settles later.
///
/// The UI loop never blocks on it; callers check it with [`Pending::poll`]
/// on each tick. There is no way to retract the write.
#[derive(Debug)]
pub struct Pending<T> {
    rx: Receiver<T>,
    done: bool,
}

/// Write side of a [`Pending`]. Dropping it without completing abandons the
/// write, which the waiting side observes as [`Settlement::Abandoned`].
#[derive(Debug)]
pub struct Completer<T> {
    tx: Sender<T>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<T> {
    Waiting,
    Settled(T),
    Abandoned,
}

pub fn pending<T>() -> (Completer<T>, Pending<T>) {
    let (tx, rx) = mpsc::channel();
    (Completer { tx }, Pending { rx, done: false })
}

impl<T> Completer<T> {
    pub fn complete(self, value: T) {
        // The waiting side may have gone away; nothing to report then.
        let _ = self.tx.send(value);
    }
}

impl<T> Pending<T> {
    pub fn ready(value: T) -> Self {
        let (completer, pending) = pending();
        completer.complete(value);
        pending
    }

    /// Returns the outcome at most once; later calls after settlement report
    /// `Abandoned`.
    pub fn poll(&mut self) -> Settlement<T> {
        if self.done {
            return Settlement::Abandoned;
        }
        match self.rx.try_recv() {
            Ok(value) => {
                self.done = true;
                Settlement::Settled(value)
            }
            Err(TryRecvError::Empty) => Settlement::Waiting,
            Err(TryRecvError::Disconnected) => {
                self.done = true;
                Settlement::Abandoned
            }
        }
    }
}
