//! In-process plugin host.
//!
//! Keeps one session per registered plugin and queues lifecycle events for
//! the plugins subscribed to them. The [`crate::poem`] routes stream the
//! queued events to the plugin stubs and collect their replies.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use error_stack::bail;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::trace;
use tracing::warn;

use crate::api::Event;
use crate::api::EventReply;
use crate::api::Registration;
use crate::error::CommError;
use crate::error::CommResult;
use crate::mask::EventMask;
use crate::types::TaskId;
use crate::types::TaskItem;
use crate::types::TaskResult;

/// Configuration for the plugin host.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Reported to plugins in the `Configure` event
    pub runtime_name: String,
    pub runtime_version: String,
    /// Opaque config handed to every plugin on `Configure`
    pub plugin_config: String,
    /// Maximum number of events to keep queued per plugin
    pub max_queue_size: usize,
    /// Maximum number of replies to keep per plugin
    pub max_history_size: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            runtime_name: "nri-stub-host".to_string(),
            runtime_version: env!("CARGO_PKG_VERSION").to_string(),
            plugin_config: String::new(),
            max_queue_size: 1000,
            max_history_size: 100,
        }
    }
}

/// A queued event for one plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub plugin_id: String,
    pub task_id: TaskId,
}

#[derive(Debug)]
struct PluginSession {
    registration: Registration,
    /// Set once the plugin answers `Configure`
    mask: Option<EventMask>,
    pending: VecDeque<TaskItem<Event>>,
    processing: HashMap<TaskId, TaskItem<Event>>,
    completed: VecDeque<TaskResult<EventReply>>,
    last_activity: chrono::DateTime<Utc>,
}

impl PluginSession {
    fn new(registration: Registration) -> Self {
        Self {
            registration,
            mask: None,
            pending: VecDeque::new(),
            processing: HashMap::new(),
            completed: VecDeque::new(),
            last_activity: Utc::now(),
        }
    }

    fn enqueue(&mut self, event: Event, max_queue_size: usize) -> CommResult<TaskId> {
        if self.pending.len() >= max_queue_size {
            bail!(CommError::HostState {
                message: format!(
                    "Event queue of {} is full",
                    self.registration.plugin_id()
                ),
            });
        }

        let task = TaskItem::new(event);
        let task_id = task.id;
        self.pending.push_back(task);
        self.last_activity = Utc::now();
        Ok(task_id)
    }

    fn dequeue(&mut self) -> Option<TaskItem<Event>> {
        let task = self.pending.pop_front()?;
        self.processing.insert(task.id, task.clone());
        self.last_activity = Utc::now();
        Some(task)
    }

    fn complete(&mut self, result: TaskResult<EventReply>, max_history_size: usize) -> CommResult<()> {
        let Some(task) = self.processing.remove(&result.task_id) else {
            bail!(CommError::HostState {
                message: format!("Event {} not found in processing queue", result.task_id),
            });
        };

        let latency = Utc::now() - task.queued_at;
        debug!(
            task_id = %result.task_id,
            latency_ms = latency.num_milliseconds(),
            success = result.is_success(),
            "Plugin replied"
        );

        if let (Event::Configure { .. }, Ok(EventReply::Configured { mask })) =
            (&task.data, &result.outcome)
        {
            info!(plugin_id = %result.plugin_id, events = %mask, "Plugin subscribed");
            self.mask = Some(*mask);
        }

        if self.completed.len() >= max_history_size {
            self.completed.pop_front();
        }
        self.completed.push_back(result);
        self.last_activity = Utc::now();
        Ok(())
    }

    fn stats(&self) -> PluginStats {
        PluginStats {
            subscribed: self.mask,
            pending_events: self.pending.len(),
            processing_events: self.processing.len(),
            completed_events: self.completed.len(),
            failed_events: self.completed.iter().filter(|r| !r.is_success()).count(),
            last_activity: self.last_activity,
        }
    }
}

/// Statistics for a plugin session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginStats {
    pub subscribed: Option<EventMask>,
    pub pending_events: usize,
    pub processing_events: usize,
    pub completed_events: usize,
    pub failed_events: usize,
    pub last_activity: chrono::DateTime<Utc>,
}

/// Plugin host keeping one session per registered plugin.
pub struct PluginHost {
    config: HostConfig,
    sessions: Arc<RwLock<HashMap<String, PluginSession>>>,
}

impl PluginHost {
    pub fn new() -> Self {
        Self::with_config(HostConfig::default())
    }

    pub fn with_config(config: HostConfig) -> Self {
        info!(
            runtime_name = %config.runtime_name,
            max_queue_size = config.max_queue_size,
            max_history_size = config.max_history_size,
            "Plugin host created"
        );

        Self {
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start a session for the plugin and queue its `Configure` event.
    /// A plugin registering again replaces its previous session.
    #[instrument(skip(self))]
    pub async fn register_plugin(&self, registration: Registration) -> CommResult<TaskId> {
        let plugin_id = registration.plugin_id();
        let mut session = PluginSession::new(registration);
        let task_id = session.enqueue(
            Event::Configure {
                config: self.config.plugin_config.clone(),
                runtime_name: self.config.runtime_name.clone(),
                runtime_version: self.config.runtime_version.clone(),
            },
            self.config.max_queue_size,
        )?;

        let mut sessions = self.sessions.write().await;
        if sessions.insert(plugin_id.clone(), session).is_some() {
            warn!(%plugin_id, "Plugin re-registered, previous session dropped");
        }

        info!(%plugin_id, "Plugin registered");
        Ok(task_id)
    }

    /// Queue `event` for every configured plugin whose mask contains it.
    /// Plugins that have not answered `Configure` yet receive nothing.
    #[instrument(skip(self, event), fields(kind = ?event.kind()))]
    pub async fn deliver(&self, event: Event) -> CommResult<Vec<Delivery>> {
        if event.kind().is_none() {
            bail!(CommError::HostState {
                message: "Configure is only sent on registration".to_string(),
            });
        }

        let mut sessions = self.sessions.write().await;
        let mut deliveries = Vec::new();
        for (plugin_id, session) in sessions.iter_mut() {
            let subscribed = session.mask.is_some_and(|mask| event.is_subscribed(mask));
            if !subscribed {
                trace!(%plugin_id, "Plugin not subscribed, skipping");
                continue;
            }

            let task_id = session.enqueue(event.clone(), self.config.max_queue_size)?;
            debug!(%task_id, %plugin_id, "Event queued for plugin");
            deliveries.push(Delivery {
                plugin_id: plugin_id.clone(),
                task_id,
            });
        }

        Ok(deliveries)
    }

    /// Drop the plugin's session, which ends its event stream.
    pub async fn close_plugin(&self, plugin_id: &str) -> bool {
        let closed = self.sessions.write().await.remove(plugin_id).is_some();
        if closed {
            info!(%plugin_id, "Plugin session closed");
        }
        closed
    }

    pub async fn is_registered(&self, plugin_id: &str) -> bool {
        self.sessions.read().await.contains_key(plugin_id)
    }

    /// Ids of all registered plugins, sorted.
    pub async fn registered_plugins(&self) -> Vec<String> {
        let mut plugins: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        plugins.sort();
        plugins
    }

    /// The mask the plugin answered `Configure` with.
    pub async fn subscription(&self, plugin_id: &str) -> Option<EventMask> {
        self.sessions
            .read()
            .await
            .get(plugin_id)
            .and_then(|session| session.mask)
    }

    /// The plugin's reply to a delivered event, once it arrived.
    pub async fn reply(&self, plugin_id: &str, task_id: TaskId) -> Option<TaskResult<EventReply>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(plugin_id)?
            .completed
            .iter()
            .find(|result| result.task_id == task_id)
            .cloned()
    }

    pub async fn get_plugin_stats(&self, plugin_id: &str) -> Option<PluginStats> {
        let sessions = self.sessions.read().await;
        sessions.get(plugin_id).map(|session| session.stats())
    }

    pub async fn poll_event_internal(&self, plugin_id: &str) -> CommResult<Option<TaskItem<Event>>> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(plugin_id) else {
            bail!(CommError::PluginNotRegistered {
                plugin_id: plugin_id.to_string(),
            });
        };

        let task = session.dequeue();
        if task.is_some() {
            trace!(%plugin_id, "Event dequeued for plugin");
        }

        Ok(task)
    }

    pub async fn submit_reply_internal(&self, result: TaskResult<EventReply>) -> CommResult<()> {
        let mut sessions = self.sessions.write().await;

        if let Some(session) = sessions.get_mut(&result.plugin_id) {
            if session.processing.contains_key(&result.task_id) {
                let task_id = result.task_id;
                let plugin_id = result.plugin_id.clone();
                session.complete(result, self.config.max_history_size)?;
                debug!(%task_id, %plugin_id, "Plugin reply processed");
                return Ok(());
            }
        }

        warn!(task_id = %result.task_id, "Reply received for unknown event");
        bail!(CommError::HostState {
            message: format!(
                "Reply for event {} from plugin {} could not be processed because event or plugin not found",
                result.task_id, result.plugin_id
            ),
        });
    }
}

impl Default for PluginHost {
    fn default() -> Self {
        Self::new()
    }
}
