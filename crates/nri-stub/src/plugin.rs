//! The plugin side of the host interface.

use core::error::Error;

use tracing::trace;

use crate::api::Container;
use crate::api::ContainerAdjustment;
use crate::api::CreateContainerResponse;
use crate::api::Event;
use crate::api::EventReply;
use crate::api::PodSandbox;
use crate::mask::EventKind;
use crate::mask::EventMask;

/// Error returned by a plugin handler. Reported to the host as a failed reply.
pub type HandlerError = Box<dyn Error + Send + Sync>;

pub type HandlerResult<T> = Result<T, HandlerError>;

/// Returned by [`dispatch`] for an event outside the negotiated mask.
#[derive(Debug, derive_more::Display)]
#[display("plugin is not subscribed to {_0}")]
pub struct Unsubscribed(pub EventKind);

impl Error for Unsubscribed {}

/// Lifecycle callbacks of a plugin.
///
/// Only [`Plugin::configure`] has to be implemented. Every other callback
/// defaults to doing nothing, so a plugin overrides just the events it
/// subscribes to.
pub trait Plugin: Send + Sync {
    /// Called once after registration with the host's plugin config.
    /// Returns the events the plugin wants to receive.
    fn configure(&self, config: &str) -> HandlerResult<EventMask>;

    /// Called after configuration with the pods and containers the runtime
    /// already knows about.
    fn synchronize(
        &self,
        _pods: &[PodSandbox],
        _containers: &[Container],
    ) -> HandlerResult<Vec<ContainerAdjustment>> {
        Ok(Vec::new())
    }

    /// The host is shutting down.
    fn shutdown(&self) {}

    fn run_pod_sandbox(&self, _pod: &PodSandbox) {}

    fn stop_pod_sandbox(&self, _pod: &PodSandbox) {}

    fn remove_pod_sandbox(&self, _pod: &PodSandbox) {}

    fn create_container(
        &self,
        _pod: &PodSandbox,
        _container: &Container,
    ) -> HandlerResult<CreateContainerResponse> {
        Ok(CreateContainerResponse::default())
    }

    fn post_create_container(&self, _pod: &PodSandbox, _container: &Container) {}

    fn start_container(&self, _pod: &PodSandbox, _container: &Container) {}

    fn post_start_container(&self, _pod: &PodSandbox, _container: &Container) {}

    fn update_container(
        &self,
        _pod: &PodSandbox,
        _container: &Container,
    ) -> HandlerResult<Vec<ContainerAdjustment>> {
        Ok(Vec::new())
    }

    fn post_update_container(&self, _pod: &PodSandbox, _container: &Container) {}

    fn stop_container(
        &self,
        _pod: &PodSandbox,
        _container: &Container,
    ) -> HandlerResult<Vec<ContainerAdjustment>> {
        Ok(Vec::new())
    }

    fn remove_container(&self, _pod: &PodSandbox, _container: &Container) {}
}

/// Route `event` to the matching handler of `plugin`.
///
/// Events outside `mask` fail with [`Unsubscribed`] and never reach the
/// plugin. `Configure` is always routed.
pub fn dispatch<P>(plugin: &P, mask: EventMask, event: &Event) -> HandlerResult<EventReply>
where P: Plugin + ?Sized {
    if let Some(kind) = event.kind() {
        if !mask.contains(kind) {
            return Err(Box::new(Unsubscribed(kind)));
        }
        trace!(%kind, "Dispatching event");
    }

    let reply = match event {
        Event::Configure { config, .. } => EventReply::Configured {
            mask: plugin.configure(config)?,
        },
        Event::Synchronize { pods, containers } => EventReply::Synchronized {
            updates: plugin.synchronize(pods, containers)?,
        },
        Event::Shutdown => {
            plugin.shutdown();
            EventReply::Acknowledged
        }
        Event::RunPodSandbox { pod } => {
            plugin.run_pod_sandbox(pod);
            EventReply::Acknowledged
        }
        Event::StopPodSandbox { pod } => {
            plugin.stop_pod_sandbox(pod);
            EventReply::Acknowledged
        }
        Event::RemovePodSandbox { pod } => {
            plugin.remove_pod_sandbox(pod);
            EventReply::Acknowledged
        }
        Event::CreateContainer { pod, container } => {
            EventReply::ContainerCreated(plugin.create_container(pod, container)?)
        }
        Event::PostCreateContainer { pod, container } => {
            plugin.post_create_container(pod, container);
            EventReply::Acknowledged
        }
        Event::StartContainer { pod, container } => {
            plugin.start_container(pod, container);
            EventReply::Acknowledged
        }
        Event::PostStartContainer { pod, container } => {
            plugin.post_start_container(pod, container);
            EventReply::Acknowledged
        }
        Event::UpdateContainer { pod, container } => EventReply::ContainersUpdated {
            updates: plugin.update_container(pod, container)?,
        },
        Event::PostUpdateContainer { pod, container } => {
            plugin.post_update_container(pod, container);
            EventReply::Acknowledged
        }
        Event::StopContainer { pod, container } => EventReply::ContainersUpdated {
            updates: plugin.stop_container(pod, container)?,
        },
        Event::RemoveContainer { pod, container } => {
            plugin.remove_container(pod, container);
            EventReply::Acknowledged
        }
    };

    Ok(reply)
}
