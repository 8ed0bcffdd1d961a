//! Two-phase model of the global `ym` command channel.
//!
//! Before the remote tag script arrives, the slot holds a locally installed
//! stub whose only job is to queue invocations in call order. Once the
//! vendor script takes over, queued commands are replayed in that order and
//! later invocations go straight through. The takeover happens at an
//! unpredictable time outside this crate's control; `promote` models it for
//! in-memory pages and tests.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::Value;

/// Command vocabulary of the Metrika tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Init,
    ReachGoal,
    Hit,
    SetUserId,
    UserParams,
    FirstPartyParams,
}

impl CommandKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Init => "init",
            CommandKind::ReachGoal => "reachGoal",
            CommandKind::Hit => "hit",
            CommandKind::SetUserId => "setUserID",
            CommandKind::UserParams => "userParams",
            CommandKind::FirstPartyParams => "firstPartyParams",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One invocation of the global channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    pub counter_id: u64,
    pub kind: CommandKind,
    pub args: Vec<Value>,
}

impl Command {
    pub fn new(counter_id: u64, kind: CommandKind, args: Vec<Value>) -> Self {
        Self {
            counter_id,
            kind,
            args,
        }
    }

    /// Vendor wire shape: `[counterId, commandName, ...args]`.
    pub fn invocation_args(&self) -> Vec<Value> {
        let mut args = Vec::with_capacity(self.args.len() + 2);
        args.push(Value::from(self.counter_id));
        args.push(Value::String(self.kind.as_str().to_owned()));
        args.extend(self.args.iter().cloned());
        args
    }
}

/// Receiver standing in for the live vendor implementation.
pub trait CommandSink: Send + Sync {
    fn dispatch(&self, command: Command);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelPhase {
    Vacant,
    Stub,
    Live,
}

enum Slot {
    Vacant,
    Stub {
        queue: Vec<Command>,
        installed_at_ms: i64,
    },
    Live(Arc<dyn CommandSink>),
}

/// The window-scoped command slot. At all times exactly zero or one
/// occupant exists; `install_stub` never replaces an existing occupant.
pub struct CommandChannel {
    slot: Mutex<Slot>,
}

impl CommandChannel {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Vacant),
        }
    }

    /// Installs the queueing stub if the slot is vacant and records the
    /// load-timestamp marker. Returns whether a new stub was installed.
    pub fn install_stub(&self) -> bool {
        let mut slot = self.slot.lock().unwrap();
        match *slot {
            Slot::Vacant => {
                *slot = Slot::Stub {
                    queue: Vec::new(),
                    installed_at_ms: chrono::Utc::now().timestamp_millis(),
                };
                true
            }
            _ => false,
        }
    }

    /// Queues in stub phase, forwards in live phase. Invocations against a
    /// vacant slot are silently swallowed, matching the stub's own defense
    /// against the global being cleared underneath a caller.
    pub fn invoke(&self, command: Command) {
        let sink = {
            let mut slot = self.slot.lock().unwrap();
            match &mut *slot {
                Slot::Vacant => return,
                Slot::Stub { queue, .. } => {
                    queue.push(command);
                    return;
                }
                Slot::Live(sink) => Arc::clone(sink),
            }
        };
        // Dispatched outside the lock; the sink may invoke the channel again.
        sink.dispatch(command);
    }

    /// Vendor takeover: replaces the occupant with the live sink and replays
    /// the stub backlog into it in call order.
    pub fn promote(&self, sink: Arc<dyn CommandSink>) {
        let backlog = {
            let mut slot = self.slot.lock().unwrap();
            let previous = std::mem::replace(&mut *slot, Slot::Live(Arc::clone(&sink)));
            match previous {
                Slot::Stub { queue, .. } => queue,
                _ => Vec::new(),
            }
        };
        for command in backlog {
            sink.dispatch(command);
        }
    }

    /// Empties the slot, discarding any stub backlog.
    pub fn clear(&self) {
        *self.slot.lock().unwrap() = Slot::Vacant;
    }

    pub fn phase(&self) -> ChannelPhase {
        match *self.slot.lock().unwrap() {
            Slot::Vacant => ChannelPhase::Vacant,
            Slot::Stub { .. } => ChannelPhase::Stub,
            Slot::Live(_) => ChannelPhase::Live,
        }
    }

    /// Whether anything callable occupies the slot. A stub counts: callers
    /// cannot tell a stub from the live implementation, only callability.
    pub fn is_callable(&self) -> bool {
        self.phase() != ChannelPhase::Vacant
    }

    /// Snapshot of the stub backlog. Empty outside stub phase.
    pub fn queued(&self) -> Vec<Command> {
        match &*self.slot.lock().unwrap() {
            Slot::Stub { queue, .. } => queue.clone(),
            _ => Vec::new(),
        }
    }

    /// Epoch-ms marker recorded when the stub was installed.
    pub fn stub_marker_ms(&self) -> Option<i64> {
        match &*self.slot.lock().unwrap() {
            Slot::Stub {
                installed_at_ms, ..
            } => Some(*installed_at_ms),
            _ => None,
        }
    }
}

impl Default for CommandChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CommandChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandChannel")
            .field("phase", &self.phase())
            .finish()
    }
}
