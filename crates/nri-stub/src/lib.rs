//! Plugin stub for the node resource interface of a container runtime.
//!
//! The runtime (the *host*) delivers pod and container lifecycle events to
//! its plugins and applies the adjustments they return:
//!
//! - A plugin registers with the host and answers `Configure` with the
//!   [`EventMask`] of events it wants to see
//! - The host streams subscribed events to the plugin
//! - The plugin posts one reply per event back to the host
//!
//! Plugins implement [`Plugin`], overriding only the callbacks they
//! subscribe to, and hand themselves to a [`Stub`]. [`PluginHost`] together
//! with [`poem::create_routes`] is an in-process host, used to drive plugins
//! in tests.
//!
//! # Examples
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use nri_stub::{EventMask, HandlerResult, Plugin, PodSandbox, Stub, StubConfig};
//! # use tokio_util::sync::CancellationToken;
//! struct Logger;
//!
//! impl Plugin for Logger {
//!     fn configure(&self, _config: &str) -> HandlerResult<EventMask> {
//!         Ok(EventMask::RUN_POD_SANDBOX)
//!     }
//!
//!     fn run_pod_sandbox(&self, pod: &PodSandbox) {
//!         println!("{}/{}", pod.namespace, pod.name);
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StubConfig::new("http://127.0.0.1:8877", "logger");
//! let stub = Stub::new(Arc::new(Logger), config).map_err(|e| format!("{e:?}"))?;
//! stub.run(CancellationToken::new()).map_err(|e| format!("{e:?}"))?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod host;
pub mod mask;
pub mod plugin;
pub mod poem;
pub mod stub;
pub mod types;

pub use api::Container;
pub use api::ContainerAdjustment;
pub use api::ContainerCreateAdjustment;
pub use api::CreateContainerResponse;
pub use api::Event;
pub use api::EventReply;
pub use api::PodSandbox;
pub use api::Registration;
pub use config::StubConfig;
pub use error::CommError;
pub use error::CommResult;
pub use host::Delivery;
pub use host::HostConfig;
pub use host::PluginHost;
pub use host::PluginStats;
pub use mask::EventKind;
pub use mask::EventMask;
pub use plugin::dispatch;
pub use plugin::HandlerError;
pub use plugin::HandlerResult;
pub use plugin::Plugin;
pub use stub::StopReason;
pub use stub::Stub;
pub use types::TaskId;
pub use types::TaskItem;
pub use types::TaskResult;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn create_stub_config() {
        let config = StubConfig::new("http://localhost:8877/", "podresources")
            .with_plugin_idx("20")
            .with_base_path("/runtime/nri")
            .with_request_timeout(Duration::from_secs(10));

        assert_eq!(config.plugin_id(), "20-podresources");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(
            config.url("/register"),
            "http://localhost:8877/runtime/nri/register"
        );
    }

    #[test]
    fn stub_config_defaults() {
        let config = StubConfig::new("http://localhost:8877", "podresources");

        assert_eq!(config.base_path, config::DEFAULT_BASE_PATH);
        assert_eq!(config.plugin_idx, "10");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn task_ids_and_outcomes() {
        let task_id1 = TaskId::new();
        let task_id2 = TaskId::new();

        assert_ne!(task_id1, task_id2);

        let task_item = TaskItem::new(Event::Shutdown);
        assert_eq!(task_item.data, Event::Shutdown);

        let success = TaskResult::success(task_id1, "10-podresources", EventReply::Acknowledged);
        assert!(success.is_success());
        assert_eq!(success.outcome, Ok(EventReply::Acknowledged));

        let failure = TaskResult::<EventReply>::failure(task_id2, "10-podresources", "boom");
        assert!(!failure.is_success());
        assert_eq!(
            serde_json::to_value(&failure).unwrap()["outcome"],
            serde_json::json!({ "Err": "boom" })
        );
    }
}
