//! Objects exchanged between the plugin host and its plugins.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::mask::EventKind;
use crate::mask::EventMask;

/// A pod sandbox as seen by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodSandbox {
    pub id: String,
    pub name: String,
    pub uid: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

impl PodSandbox {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A container as seen by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Container {
    pub id: String,
    pub pod_sandbox_id: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

/// Changes a plugin requests for a container that is being created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerCreateAdjustment {
    pub annotations: BTreeMap<String, String>,
}

/// Changes a plugin requests for an already existing container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerAdjustment {
    pub id: String,
    pub annotations: BTreeMap<String, String>,
}

/// Output of a container creation handler.
///
/// `adjustment` applies to the container being created, `updates` to other
/// containers the host already knows about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateContainerResponse {
    pub adjustment: Option<ContainerCreateAdjustment>,
    pub updates: Vec<ContainerAdjustment>,
}

impl CreateContainerResponse {
    /// True when the response asks the host to change nothing.
    pub fn is_empty(&self) -> bool {
        self.adjustment.is_none() && self.updates.is_empty()
    }
}

/// Sent by a plugin to announce itself to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub plugin_name: String,
    pub plugin_idx: String,
}

impl Registration {
    /// The id the host keys this plugin's session by.
    pub fn plugin_id(&self) -> String {
        format!("{}-{}", self.plugin_idx, self.plugin_name)
    }
}

/// Host acknowledgement of a [`Registration`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationAck {
    pub plugin_id: String,
}

/// A lifecycle event delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Configure {
        config: String,
        runtime_name: String,
        runtime_version: String,
    },
    Synchronize {
        pods: Vec<PodSandbox>,
        containers: Vec<Container>,
    },
    Shutdown,
    RunPodSandbox {
        pod: PodSandbox,
    },
    StopPodSandbox {
        pod: PodSandbox,
    },
    RemovePodSandbox {
        pod: PodSandbox,
    },
    CreateContainer {
        pod: PodSandbox,
        container: Container,
    },
    PostCreateContainer {
        pod: PodSandbox,
        container: Container,
    },
    StartContainer {
        pod: PodSandbox,
        container: Container,
    },
    PostStartContainer {
        pod: PodSandbox,
        container: Container,
    },
    UpdateContainer {
        pod: PodSandbox,
        container: Container,
    },
    PostUpdateContainer {
        pod: PodSandbox,
        container: Container,
    },
    StopContainer {
        pod: PodSandbox,
        container: Container,
    },
    RemoveContainer {
        pod: PodSandbox,
        container: Container,
    },
}

impl Event {
    /// Subscription category of the event. `Configure` has none, it is
    /// part of the registration handshake and always delivered.
    pub fn kind(&self) -> Option<EventKind> {
        let kind = match self {
            Event::Configure { .. } => return None,
            Event::Synchronize { .. } => EventKind::Synchronize,
            Event::Shutdown => EventKind::Shutdown,
            Event::RunPodSandbox { .. } => EventKind::RunPodSandbox,
            Event::StopPodSandbox { .. } => EventKind::StopPodSandbox,
            Event::RemovePodSandbox { .. } => EventKind::RemovePodSandbox,
            Event::CreateContainer { .. } => EventKind::CreateContainer,
            Event::PostCreateContainer { .. } => EventKind::PostCreateContainer,
            Event::StartContainer { .. } => EventKind::StartContainer,
            Event::PostStartContainer { .. } => EventKind::PostStartContainer,
            Event::UpdateContainer { .. } => EventKind::UpdateContainer,
            Event::PostUpdateContainer { .. } => EventKind::PostUpdateContainer,
            Event::StopContainer { .. } => EventKind::StopContainer,
            Event::RemoveContainer { .. } => EventKind::RemoveContainer,
        };
        Some(kind)
    }

    /// Whether a plugin subscribed with `mask` should receive this event.
    pub fn is_subscribed(&self, mask: EventMask) -> bool {
        self.kind().map_or(true, |kind| mask.contains(kind))
    }
}

/// A plugin's answer to an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum EventReply {
    Configured { mask: EventMask },
    Synchronized { updates: Vec<ContainerAdjustment> },
    ContainerCreated(CreateContainerResponse),
    ContainersUpdated { updates: Vec<ContainerAdjustment> },
    Acknowledged,
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn plugin_id_joins_index_and_name() {
        let registration = Registration {
            plugin_name: "podresources".to_string(),
            plugin_idx: "10".to_string(),
        };
        assert_eq!(registration.plugin_id(), "10-podresources");
    }

    #[test]
    fn configure_is_always_subscribed() {
        let event = Event::Configure {
            config: String::new(),
            runtime_name: "fake".to_string(),
            runtime_version: "0.0.0".to_string(),
        };
        assert!(event.kind().is_none());
        assert!(event.is_subscribed(EventMask::empty()));
    }

    #[test]
    fn lifecycle_events_follow_the_mask() {
        let event = Event::RunPodSandbox {
            pod: PodSandbox::new("default", "web-1"),
        };
        assert!(event.is_subscribed(EventMask::RUN_POD_SANDBOX));
        assert!(!event.is_subscribed(EventMask::CREATE_CONTAINER));
    }

    #[test]
    fn event_wire_format_is_tagged() {
        let event = Event::CreateContainer {
            pod: PodSandbox::new("default", "web-1"),
            container: Container {
                id: "c1".to_string(),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&event).expect("should serialize event");
        assert_eq!(json["event"], "create_container");
        assert_eq!(json["pod"]["namespace"], "default");
        assert_eq!(json["container"]["id"], "c1");
    }

    #[test]
    fn empty_create_response() {
        assert!(CreateContainerResponse::default().is_empty());

        let response = CreateContainerResponse {
            adjustment: Some(ContainerCreateAdjustment::default()),
            updates: Vec::new(),
        };
        assert!(!response.is_empty());
    }
}
