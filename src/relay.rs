//! Event relay loop.
//!
//! ```text
//!            start
//!   Init ───────────► Steady ◄──────────┐
//!                      │   │            │ reopen succeeded
//!      source lost     │   │            │
//!   (recovery enabled) │   └──────► Failed ◄─┐
//!                      │                └────┘ reopen failed / no path
//!                      ▼
//!                     Halt  ◄── cancellation, partial record,
//!                               source lost (recovery disabled),
//!                               supervisor hang-up
//! ```
//!
//! Every wait is bounded ([`Timings`]), so a [`CancelToken`] set from a
//! signal handler is observed within one interval. Records are copied one
//! at a time and written unmodified unless the [`EventFilter`] drops them.

use crate::cancel::CancelToken;
use crate::event::InputEvent;
use crate::filter::EventFilter;
use crate::platform::sys;
use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Longest a single readiness wait may block.
pub const WAIT_TIMEOUT: Duration = Duration::from_millis(100);
/// Pause between reopen attempts while the source is gone.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(100);
/// Pause while the source is gone and cannot be reopened.
pub const IDLE_INTERVAL: Duration = Duration::from_millis(200);

/// Consecutive failed waits tolerated before giving up.
const MAX_POLL_FAILURES: u32 = 1000;

/// Where the relay loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Not started yet.
    Init,
    /// Copying records from the source.
    Steady,
    /// Source lost; trying to get it back.
    Failed,
    /// Finished. Terminal.
    Halt,
}

/// What to do when the source device goes away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryPolicy {
    /// Close the source and keep trying to reopen it.
    #[default]
    Enabled,
    /// Halt the relay.
    Disabled,
}

/// Why the relay halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// The cancellation token was set.
    Cancelled,
    /// The source reached end-of-stream.
    SourceClosed,
    /// The source reported an error or hang-up through `poll`.
    SourceError,
    /// Reading the source failed.
    ReadError(io::ErrorKind),
    /// A read returned a byte count other than one record.
    PartialRecord(usize),
    /// The watched supervisor descriptor reached end-of-file.
    SupervisorHangup,
    /// Waiting for readiness kept failing.
    PollFailures,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "interrupted"),
            Self::SourceClosed => write!(f, "source device closed"),
            Self::SourceError => write!(f, "source device reported an error"),
            Self::ReadError(kind) => write!(f, "error reading source device ({kind})"),
            Self::PartialRecord(n) => write!(f, "partial read of {n} bytes from source device"),
            Self::SupervisorHangup => write!(f, "standard input closed"),
            Self::PollFailures => write!(f, "excessive failures waiting for events"),
        }
    }
}

/// Counters accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Records written to the sink.
    pub relayed: u64,
    /// Records dropped by the filter.
    pub filtered: u64,
    /// Records the sink refused.
    pub dropped: u64,
    /// Successful source reopens.
    pub reconnects: u64,
}

/// Result of [`Relay::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    pub reason: HaltReason,
    pub stats: RelayStats,
}

/// Wait intervals used by the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub wait: Duration,
    pub retry: Duration,
    pub idle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            wait: WAIT_TIMEOUT,
            retry: RETRY_INTERVAL,
            idle: IDLE_INTERVAL,
        }
    }
}

/// Destination for relayed records.
pub trait EventSink {
    fn write_event(&mut self, event: &InputEvent) -> io::Result<()>;
}

/// Watches a descriptor held by a supervising process (normally standard
/// input) and reports when the supervisor hangs up.
///
/// A descriptor already at end-of-file on the first probe was never
/// connected to anything interactive and is ignored from then on.
#[derive(Debug)]
pub struct HangupWatch {
    input: File,
    phase: WatchPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchPhase {
    Probing,
    Watching,
    Ignored,
}

impl HangupWatch {
    pub fn new(fd: OwnedFd) -> Self {
        Self {
            input: File::from(fd),
            phase: WatchPhase::Probing,
        }
    }

    /// Watch a duplicate of standard input.
    pub fn stdin() -> io::Result<Self> {
        Ok(Self::new(io::stdin().as_fd().try_clone_to_owned()?))
    }

    fn probe(&mut self) {
        if self.phase != WatchPhase::Probing {
            return;
        }
        let mut fds = [pollfd(self.input.as_raw_fd())];
        let ready = matches!(sys::poll(&mut fds, Duration::ZERO), Ok(n) if n > 0);
        self.phase = WatchPhase::Watching;
        if ready && self.hung_up() {
            log::debug!("standard input closed from the start, not watching it");
            self.phase = WatchPhase::Ignored;
        }
    }

    fn watched_fd(&self) -> RawFd {
        match self.phase {
            WatchPhase::Watching => self.input.as_raw_fd(),
            _ => -1,
        }
    }

    /// Consume whatever is readable; true once the other end is gone.
    fn hung_up(&mut self) -> bool {
        let mut scratch = [0u8; 4096];
        match self.input.read(&mut scratch) {
            Ok(0) => true,
            Ok(_) => false,
            Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) => {
                false
            }
            Err(e) => {
                log::warn!("reading standard input: {e}");
                true
            }
        }
    }
}

/// `pollfd` waiting for input on `fd`. Negative descriptors are skipped by
/// `poll`.
fn pollfd(fd: RawFd) -> libc::pollfd {
    libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    }
}

type Reopen<S> = Box<dyn FnMut(&Path) -> io::Result<S>>;

/// The relay state machine.
///
/// Owns the source handle (replaced on reconnect) and the sink (kept for
/// the whole run; get it back with [`Relay::into_sink`]).
pub struct Relay<S, K> {
    state: RelayState,
    source: Option<S>,
    source_path: Option<PathBuf>,
    reopen: Option<Reopen<S>>,
    sink: K,
    filter: EventFilter,
    policy: RecoveryPolicy,
    timings: Timings,
    cancel: CancelToken,
    watch: Option<HangupWatch>,
    stats: RelayStats,
    poll_failures: u32,
    halt_reason: Option<HaltReason>,
}

impl<S, K> Relay<S, K>
where
    S: Read + AsRawFd,
    K: EventSink,
{
    /// Relay from `source` to `sink` until `cancel` is set.
    ///
    /// Without [`Relay::with_reopen`] a lost source can never come back.
    pub fn new(source: S, sink: K, cancel: CancelToken) -> Self {
        Self {
            state: RelayState::Init,
            source: Some(source),
            source_path: None,
            reopen: None,
            sink,
            filter: EventFilter::pass_all(),
            policy: RecoveryPolicy::default(),
            timings: Timings::default(),
            cancel,
            watch: None,
            stats: RelayStats::default(),
            poll_failures: 0,
            halt_reason: None,
        }
    }

    /// Reopen the source from `path` with `reopen` after it is lost.
    pub fn with_reopen<F>(mut self, path: impl Into<PathBuf>, reopen: F) -> Self
    where
        F: FnMut(&Path) -> io::Result<S> + 'static,
    {
        self.source_path = Some(path.into());
        self.reopen = Some(Box::new(reopen));
        self
    }

    pub fn with_filter(mut self, filter: EventFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_policy(mut self, policy: RecoveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// Also halt when `watch` reports that the supervisor hung up.
    pub fn with_hangup_watch(mut self, watch: HangupWatch) -> Self {
        self.watch = Some(watch);
        self
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halt_reason
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Run until [`RelayState::Halt`].
    pub fn run(&mut self) -> RelayOutcome {
        while self.step() != RelayState::Halt {}
        RelayOutcome {
            reason: self.halt_reason.unwrap_or(HaltReason::Cancelled),
            stats: self.stats,
        }
    }

    /// Perform one transition and return the new state.
    ///
    /// In `Steady` this is one bounded wait plus at most one record; in
    /// `Failed` one pause plus at most one reopen attempt.
    pub fn step(&mut self) -> RelayState {
        if self.state != RelayState::Halt && self.cancel.is_cancelled() {
            self.halt(HaltReason::Cancelled);
        }
        match self.state {
            RelayState::Init => self.start(),
            RelayState::Steady => self.relay_once(),
            RelayState::Failed => self.recover_once(),
            RelayState::Halt => {}
        }
        self.state
    }

    fn start(&mut self) {
        if let Some(watch) = self.watch.as_mut() {
            watch.probe();
        }
        self.state = if self.source.is_some() {
            RelayState::Steady
        } else {
            RelayState::Failed
        };
    }

    fn watched_fd(&self) -> RawFd {
        self.watch.as_ref().map_or(-1, HangupWatch::watched_fd)
    }

    fn supervisor_hung_up(&mut self) -> bool {
        self.watch.as_mut().is_some_and(HangupWatch::hung_up)
    }

    fn relay_once(&mut self) {
        let Some(source) = self.source.as_ref() else {
            self.state = RelayState::Failed;
            return;
        };
        let mut fds = [pollfd(source.as_raw_fd()), pollfd(self.watched_fd())];

        match sys::poll(&mut fds, self.timings.wait) {
            Ok(0) => {
                self.poll_failures = 0;
                return;
            }
            Ok(_) => self.poll_failures = 0,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return,
            Err(e) => {
                self.poll_failures += 1;
                if self.poll_failures > MAX_POLL_FAILURES {
                    log::error!("waiting for source events: {e}");
                    self.halt(HaltReason::PollFailures);
                }
                return;
            }
        }

        if fds[1].revents != 0 && self.supervisor_hung_up() {
            self.halt(HaltReason::SupervisorHangup);
            return;
        }

        let revents = fds[0].revents;
        if revents & libc::POLLIN != 0 {
            self.read_record();
        } else if revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
            self.source_lost(HaltReason::SourceError);
        }
    }

    fn read_record(&mut self) {
        let Some(source) = self.source.as_mut() else {
            return;
        };
        let mut buf = [0u8; InputEvent::SIZE];
        match source.read(&mut buf) {
            Ok(n) if n == InputEvent::SIZE => {
                if let Some(event) = InputEvent::from_bytes(&buf) {
                    self.forward(&event);
                }
            }
            Ok(0) => self.source_lost(HaltReason::SourceClosed),
            Ok(n) => {
                log::error!("partial read of {n} bytes from source device");
                self.halt(HaltReason::PartialRecord(n));
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) => {}
            Err(e) => {
                log::warn!("reading from source device: {e}");
                self.source_lost(HaltReason::ReadError(e.kind()));
            }
        }
    }

    fn forward(&mut self, event: &InputEvent) {
        if !self.filter.allows(event) {
            self.stats.filtered += 1;
            return;
        }
        match self.sink.write_event(event) {
            Ok(()) => self.stats.relayed += 1,
            Err(e) => {
                log::debug!("virtual device dropped {event:?}: {e}");
                self.stats.dropped += 1;
            }
        }
    }

    fn source_lost(&mut self, reason: HaltReason) {
        match self.policy {
            RecoveryPolicy::Disabled => self.halt(reason),
            RecoveryPolicy::Enabled => {
                self.source = None;
                self.state = RelayState::Failed;
                match self.source_path.as_deref() {
                    Some(path) if self.reopen.is_some() => {
                        log::warn!("{reason}; waiting for {} to return", path.display());
                    }
                    _ => log::warn!("{reason}; source cannot be reopened, idling"),
                }
            }
        }
    }

    fn recover_once(&mut self) {
        let can_reopen = self.source_path.is_some() && self.reopen.is_some();
        let interval = if can_reopen {
            self.timings.retry
        } else {
            self.timings.idle
        };
        self.pause(interval);

        if self.state == RelayState::Halt || !can_reopen {
            return;
        }
        if self.cancel.is_cancelled() {
            self.halt(HaltReason::Cancelled);
            return;
        }

        let (Some(path), Some(reopen)) = (self.source_path.as_deref(), self.reopen.as_mut()) else {
            return;
        };
        match reopen(path) {
            Ok(source) => {
                log::info!("source device {} is back", path.display());
                self.source = Some(source);
                self.stats.reconnects += 1;
                self.state = RelayState::Steady;
            }
            Err(e) => log::debug!("reopening {}: {e}", path.display()),
        }
    }

    /// Sleep for `interval`, still noticing a supervisor hang-up.
    ///
    /// Data arriving from the supervisor is drained without cutting the
    /// sleep short.
    fn pause(&mut self, interval: Duration) {
        let deadline = Instant::now() + interval;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let mut fds = [pollfd(self.watched_fd())];
            match sys::poll(&mut fds, remaining) {
                Ok(0) => return,
                Ok(_) if self.supervisor_hung_up() => {
                    self.halt(HaltReason::SupervisorHangup);
                    return;
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    log::debug!("waiting to reopen source: {e}");
                    return;
                }
            }
            if remaining.is_zero() {
                return;
            }
        }
    }

    fn halt(&mut self, reason: HaltReason) {
        if self.state != RelayState::Halt {
            log::debug!("relay halting: {reason}");
            self.halt_reason = Some(reason);
            self.state = RelayState::Halt;
        }
    }
}
