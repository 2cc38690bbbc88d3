// SPDX-License-Identifier: GPL-3.0-only

//! Stop requests from SIGINT/SIGTERM/SIGHUP
//!
//! The handler is installed once per process. While a supervisor is waiting on
//! children it subscribes with [`StopSignal::route_to`] and receives the
//! request as a [`ChildEvent::Interrupted`] on its event channel; the children
//! are then stopped and reaped by that supervisor. With nobody subscribed no
//! child is running, so the handler ends the program directly.

use super::ChildEvent;
use crate::errors::INTERRUPTED_EXIT_CODE;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Shared {
    route: Mutex<Option<Sender<ChildEvent>>>,
    requested: AtomicBool,
}

/// Process-wide stop request dispatcher
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    shared: Arc<Shared>,
}

impl StopSignal {
    /// Dispatcher without an OS handler; stops are raised with [`Self::raise`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the OS signal handler. May only be called once per process.
    pub fn install() -> Result<Self, ctrlc::Error> {
        let signal = Self::new();
        let handler = signal.clone();
        ctrlc::set_handler(move || {
            if !handler.raise() {
                eprintln!();
                eprintln!("Interrupted.");
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        })?;
        Ok(signal)
    }

    /// Deliver a stop request. Returns false when no supervisor is listening.
    pub fn raise(&self) -> bool {
        self.shared.requested.store(true, Ordering::SeqCst);
        let route = match self.shared.route.lock() {
            Ok(route) => route,
            Err(poisoned) => poisoned.into_inner(),
        };
        match route.as_ref() {
            Some(sender) => sender.send(ChildEvent::Interrupted).is_ok(),
            None => false,
        }
    }

    /// Whether a stop was requested since the last [`Self::route_to`]
    pub fn requested(&self) -> bool {
        self.shared.requested.load(Ordering::SeqCst)
    }

    /// Send stop requests to `sender` until the returned guard is dropped
    pub fn route_to(&self, sender: Sender<ChildEvent>) -> StopRoute {
        self.shared.requested.store(false, Ordering::SeqCst);
        let mut route = match self.shared.route.lock() {
            Ok(route) => route,
            Err(poisoned) => poisoned.into_inner(),
        };
        *route = Some(sender);
        StopRoute {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Subscription guard returned by [`StopSignal::route_to`]
#[derive(Debug)]
pub struct StopRoute {
    shared: Arc<Shared>,
}

impl Drop for StopRoute {
    fn drop(&mut self) {
        let mut route = match self.shared.route.lock() {
            Ok(route) => route,
            Err(poisoned) => poisoned.into_inner(),
        };
        *route = None;
    }
}
