//! Subscription masks.
//!
//! A plugin answers the host's `Configure` event with the set of event
//! categories it wants to receive. The host only delivers events from that
//! set, and the stub refuses to dispatch anything outside of it.

use core::fmt;
use core::ops::BitOr;
use core::ops::BitOrAssign;

use serde::Deserialize;
use serde::Serialize;

/// An event category a plugin can subscribe to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum EventKind {
    RunPodSandbox,
    StopPodSandbox,
    RemovePodSandbox,
    CreateContainer,
    PostCreateContainer,
    StartContainer,
    PostStartContainer,
    UpdateContainer,
    PostUpdateContainer,
    StopContainer,
    RemoveContainer,
    Synchronize,
    Shutdown,
}

impl EventKind {
    pub const ALL: [EventKind; 13] = [
        EventKind::RunPodSandbox,
        EventKind::StopPodSandbox,
        EventKind::RemovePodSandbox,
        EventKind::CreateContainer,
        EventKind::PostCreateContainer,
        EventKind::StartContainer,
        EventKind::PostStartContainer,
        EventKind::UpdateContainer,
        EventKind::PostUpdateContainer,
        EventKind::StopContainer,
        EventKind::RemoveContainer,
        EventKind::Synchronize,
        EventKind::Shutdown,
    ];

    const fn bit(self) -> u32 {
        1 << self as u32
    }
}

/// Set of [`EventKind`]s.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventMask(u32);

impl EventMask {
    pub const RUN_POD_SANDBOX: EventMask = EventMask::of(EventKind::RunPodSandbox);
    pub const STOP_POD_SANDBOX: EventMask = EventMask::of(EventKind::StopPodSandbox);
    pub const REMOVE_POD_SANDBOX: EventMask = EventMask::of(EventKind::RemovePodSandbox);
    pub const CREATE_CONTAINER: EventMask = EventMask::of(EventKind::CreateContainer);
    pub const POST_CREATE_CONTAINER: EventMask = EventMask::of(EventKind::PostCreateContainer);
    pub const START_CONTAINER: EventMask = EventMask::of(EventKind::StartContainer);
    pub const POST_START_CONTAINER: EventMask = EventMask::of(EventKind::PostStartContainer);
    pub const UPDATE_CONTAINER: EventMask = EventMask::of(EventKind::UpdateContainer);
    pub const POST_UPDATE_CONTAINER: EventMask = EventMask::of(EventKind::PostUpdateContainer);
    pub const STOP_CONTAINER: EventMask = EventMask::of(EventKind::StopContainer);
    pub const REMOVE_CONTAINER: EventMask = EventMask::of(EventKind::RemoveContainer);
    pub const SYNCHRONIZE: EventMask = EventMask::of(EventKind::Synchronize);
    pub const SHUTDOWN: EventMask = EventMask::of(EventKind::Shutdown);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn of(kind: EventKind) -> Self {
        Self(kind.bit())
    }

    pub fn all() -> Self {
        EventKind::ALL.into_iter().collect()
    }

    pub const fn contains(self, kind: EventKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Subscribed kinds, in declaration order.
    pub fn kinds(self) -> impl Iterator<Item = EventKind> {
        EventKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        EventMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<EventKind> for EventMask {
    fn from(kind: EventKind) -> Self {
        EventMask::of(kind)
    }
}

impl FromIterator<EventKind> for EventMask {
    fn from_iter<I: IntoIterator<Item = EventKind>>(iter: I) -> Self {
        iter.into_iter()
            .fold(EventMask::empty(), |mask, kind| mask | kind.into())
    }
}

impl fmt::Display for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        for (i, kind) in self.kinds().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{kind}")?;
        }
        Ok(())
    }
}
