//! Event dispatch loop
//!
//! Alternates between waiting on the input source (bounded by a timeout so
//! the shutdown flag is observed regularly) and draining pending events.
//! Each button press is mapped to an action and injected synchronously, so
//! at most one injection is in flight and chords never interleave.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::action::{button_name, Action, ActionMap};
use crate::device::{InputSource, Readiness};
use crate::error::RemapError;
use crate::event::Event;
use crate::injector::{InjectionError, KeyInjector};

/// Default wait timeout between shutdown checks
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Dispatch loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Blocked in the source's wait, bounded by the timeout
    WaitingForEvents,
    /// Draining and handling pending events
    ProcessingBatch,
    /// Shutdown observed; terminal
    Stopped,
}

/// What happened to a single event
#[derive(Debug)]
pub enum Outcome {
    /// Not a button press (release, repeat, motion, sync, ...)
    Ignored,
    /// Button press without a binding
    Unmapped(u16),
    /// Chord injected
    Injected(Action),
    /// Chord injection failed; the loop carries on
    InjectionFailed(Action, InjectionError),
}

/// Counters for one run of the loop
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub batches: u64,
    pub events: u64,
    pub presses: u64,
    pub injections: u64,
    pub failures: u64,
    pub unmapped: u64,
}

/// Owns the action table and injector, and runs the loop over a source
pub struct Dispatcher<I: KeyInjector> {
    map: ActionMap,
    injector: I,
    timeout: Duration,
    state: LoopState,
    stats: DispatchStats,
}

impl<I: KeyInjector> Dispatcher<I> {
    pub fn new(map: ActionMap, injector: I) -> Self {
        Self {
            map,
            injector,
            timeout: DEFAULT_WAIT_TIMEOUT,
            state: LoopState::WaitingForEvents,
            stats: DispatchStats::default(),
        }
    }

    /// Set the wait timeout (how often the shutdown flag is checked)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn injector(&self) -> &I {
        &self.injector
    }

    /// Handle one event: filter to presses, map, inject
    pub fn process_event(&mut self, event: &Event) -> Outcome {
        self.stats.events += 1;
        trace!("Event: {}", event);

        if !event.is_button_press() {
            return Outcome::Ignored;
        }
        self.stats.presses += 1;

        let action = self.map.map_code(event.code);
        if !action.is_mapped() {
            self.stats.unmapped += 1;
            info!(
                "Unmapped button pressed: {} (code: {})",
                button_name(event.code),
                event.code
            );
            return Outcome::Unmapped(event.code);
        }

        info!(
            "Button pressed: {} (code: {}) -> {}",
            button_name(event.code),
            event.code,
            action.chord()
        );

        match self.injector.inject(action) {
            Ok(()) => {
                self.stats.injections += 1;
                debug!("Sent {} ({})", action.chord(), action);
                Outcome::Injected(action)
            }
            Err(e) => {
                self.stats.failures += 1;
                warn!("Failed to send {} ({}): {}", action.chord(), action, e);
                Outcome::InjectionFailed(action, e)
            }
        }
    }

    /// Handle a drained batch in order
    pub fn process_batch(&mut self, events: &[Event]) {
        self.stats.batches += 1;
        trace!("Processing batch of {} event(s)", events.len());
        for event in events {
            self.process_event(event);
        }
    }

    /// Run until `running` is cleared or the source fails.
    ///
    /// The source is consumed and dropped (closing the device) on every exit
    /// path. A hung injector blocks the loop; there is no injection timeout.
    pub fn run<S: InputSource>(
        &mut self,
        mut source: S,
        running: &AtomicBool,
    ) -> Result<DispatchStats, RemapError> {
        info!(
            "Monitoring {} for button presses (wait timeout {:?})",
            source.name(),
            self.timeout
        );
        self.state = LoopState::WaitingForEvents;

        while running.load(Ordering::SeqCst) {
            match self.state {
                LoopState::WaitingForEvents => match source.wait(self.timeout) {
                    Ok(Readiness::Ready) => self.state = LoopState::ProcessingBatch,
                    Ok(Readiness::TimedOut) => {}
                    Err(e) => {
                        self.state = LoopState::Stopped;
                        return Err(RemapError::Wait(e));
                    }
                },
                LoopState::ProcessingBatch => {
                    match source.drain() {
                        Ok(events) => self.process_batch(&events),
                        // Nothing more this cycle
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                        Err(e) => {
                            self.state = LoopState::Stopped;
                            return Err(RemapError::Read(e));
                        }
                    }
                    self.state = LoopState::WaitingForEvents;
                }
                LoopState::Stopped => break,
            }
        }

        self.state = LoopState::Stopped;
        info!("Stopping mouse button remapper");
        Ok(self.stats)
    }
}

impl<S: InputSource + ?Sized> InputSource for &mut S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn wait(&mut self, timeout: Duration) -> io::Result<Readiness> {
        (**self).wait(timeout)
    }

    fn drain(&mut self) -> io::Result<Vec<Event>> {
        (**self).drain()
    }
}
