//! Blocking plugin stub.
//!
//! The stub registers the plugin with the host, then reads events from the
//! host's server-sent event stream and posts one reply per event. It uses the
//! **blocking** `reqwest` client and `eventsource::reqwest::Client`, so
//! [`Stub::run`] must be called from a plain thread, never from inside an
//! async runtime.

use std::sync::Arc;

use error_stack::bail;
use error_stack::ResultExt;
use eventsource::reqwest::Client as EsClient;
use reqwest::blocking::Client as BlockingClient;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;
use url::Url;

use crate::api::Event;
use crate::api::EventReply;
use crate::config::StubConfig;
use crate::error::CommError;
use crate::error::CommResult;
use crate::mask::EventMask;
use crate::plugin::dispatch;
use crate::plugin::Plugin;
use crate::types::TaskItem;
use crate::types::TaskResult;

/// Why [`Stub::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum StopReason {
    #[display("host closed the event stream")]
    HostClosed,
    #[display("host sent Shutdown")]
    Shutdown,
    #[display("stub was cancelled")]
    Cancelled,
    /// The stream failed on the transport level, e.g. the host went away
    /// without closing the stream.
    #[display("event stream failed")]
    StreamError,
}

/// Connects a [`Plugin`] to its host.
pub struct Stub<P> {
    plugin: Arc<P>,
    config: StubConfig,
    http: BlockingClient,
}

impl<P> Stub<P>
where P: Plugin + 'static
{
    /// create stub
    pub fn new(plugin: Arc<P>, config: StubConfig) -> CommResult<Self> {
        let http = BlockingClient::builder()
            .timeout(config.request_timeout)
            .build()
            .change_context(CommError::Configuration {
                message: "Failed to create blocking HTTP client".into(),
            })?;

        info!(host_url = %config.host_url, plugin_id = %config.plugin_id(), "Plugin stub created");

        Ok(Self {
            plugin,
            config,
            http,
        })
    }

    pub fn plugin_id(&self) -> String {
        self.config.plugin_id()
    }

    /// Announce the plugin to the host. The host answers by queueing the
    /// `Configure` event.
    pub fn register(&self) -> CommResult<()> {
        let registration = self.config.registration();
        let response = self
            .http
            .post(self.config.url("/register"))
            .json(&registration)
            .send()
            .change_context(CommError::Registration {
                message: format!("Failed to reach plugin host at {}", self.config.host_url),
            })?;

        let status = response.status();
        if !status.is_success() {
            bail!(CommError::Http {
                status: status.as_u16(),
                message: format!("Host rejected registration of {}", registration.plugin_id()),
            });
        }

        info!(plugin_id = %registration.plugin_id(), "Registered with plugin host");
        Ok(())
    }

    /// Register and serve events until the host closes the connection
    /// (block current thread).
    ///
    /// Returns the [`StopReason`] once the event stream ends. Cancellation
    /// is only observed between events. Failing to register, to decode an
    /// event or to post a reply is an error.
    pub fn run(&self, token: CancellationToken) -> CommResult<StopReason> {
        self.register()?;

        let plugin_id = self.plugin_id();
        let events_url = self.config.url(&format!("/events/{plugin_id}"));
        let result_url = self.config.url("/result");

        info!(url = %events_url, "Connecting to plugin host event stream");
        let url = Url::parse(&events_url).change_context(CommError::Configuration {
            message: "Invalid events URL".into(),
        })?;
        let mut stream = EsClient::new(url);
        let mut mask = EventMask::empty();
        let mut stopped = StopReason::HostClosed;

        for message in &mut stream {
            if token.is_cancelled() {
                stopped = StopReason::Cancelled;
                break;
            }

            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    warn!("Event stream error: {e}");
                    stopped = StopReason::StreamError;
                    break;
                }
            };

            if message.event_type.as_deref() == Some("error") {
                debug!(reason = %message.data, "Plugin host closed the event stream");
                break;
            }
            trace!(data = %message.data, "Received event");
            if message.data.trim().is_empty() {
                continue;
            }

            let task: TaskItem<Event> =
                serde_json::from_str(&message.data).change_context(CommError::Serialization {
                    message: "Failed to deserialize event".into(),
                })?;

            let result = self.handle(&task, &mut mask);

            self.http
                .post(&result_url)
                .json(&result)
                .send()
                .change_context(CommError::Network {
                    message: "Failed to send reply".into(),
                })?;

            if task.data == Event::Shutdown {
                stopped = StopReason::Shutdown;
                break;
            }
        }

        info!(%plugin_id, reason = %stopped, "Plugin stub stopped");
        Ok(stopped)
    }

    fn handle(&self, task: &TaskItem<Event>, mask: &mut EventMask) -> TaskResult<EventReply> {
        let plugin_id = self.plugin_id();
        debug!(task_id = %task.id, "Processing event");

        match dispatch(self.plugin.as_ref(), *mask, &task.data) {
            Ok(reply) => {
                if let EventReply::Configured { mask: subscribed } = &reply {
                    info!(events = %subscribed, "Subscribed to events");
                    *mask = *subscribed;
                }
                TaskResult::success(task.id, plugin_id, reply)
            }
            Err(e) => {
                warn!(task_id = %task.id, "Event handler failed: {e}");
                TaskResult::failure(task.id, plugin_id, e.to_string())
            }
        }
    }
}
