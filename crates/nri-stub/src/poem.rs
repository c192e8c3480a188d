//! Poem integration for the [`PluginHost`].
//!
//! * `POST {base_path}/register`            – plugin registration.
//! * `GET {base_path}/events/:plugin_id`    – SSE stream pushing queued
//!   events to the plugin. Ends with an `error` event once the plugin's
//!   session is closed.
//! * `POST {base_path}/result`              – plugin replies.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use nri_stub::poem::create_routes;
//! use nri_stub::PluginHost;
//! use poem::Server;
//!
//! #[tokio::main]
//! async fn main() {
//!     let host = Arc::new(PluginHost::new());
//!     let app = create_routes(host, "/nri/v1");
//!     let listener = poem::listener::TcpListener::bind("127.0.0.1:8877");
//!     Server::new(listener).run(app).await.unwrap();
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use poem::get;
use poem::handler;
use poem::http::StatusCode;
use poem::post;
use poem::web::sse::Event as SseEvent;
use poem::web::sse::SSE;
use poem::web::Data;
use poem::web::Json;
use poem::web::Path;
use poem::Endpoint;
use poem::EndpointExt;
use poem::IntoResponse;
use poem::Response;
pub use poem::Route;
use tracing::error;

use crate::api::EventReply;
use crate::api::Registration;
use crate::api::RegistrationAck;
use crate::host::PluginHost;
use crate::types::TaskResult;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[handler]
async fn register_handler(
    Data(host): Data<&Arc<PluginHost>>,
    Json(registration): Json<Registration>,
) -> Response {
    let plugin_id = registration.plugin_id();
    match host.register_plugin(registration).await {
        Ok(_) => Json(RegistrationAck { plugin_id }).into_response(),
        Err(e) => {
            error!("Error registering plugin: {e:?}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[handler]
async fn events_handler(
    Path(plugin_id): Path<String>,
    Data(host): Data<&Arc<PluginHost>>,
) -> Response {
    if !host.is_registered(&plugin_id).await {
        return StatusCode::NOT_FOUND.into_response();
    }

    let host = Arc::clone(host);
    let sse_stream = stream! {
        loop {
            match host.poll_event_internal(&plugin_id).await {
                Ok(Some(task)) => {
                    if let Ok(json) = serde_json::to_string(&task) {
                        yield SseEvent::message(json);
                    }
                }
                Ok(None) => {
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(err) => {
                    yield SseEvent::message(err.to_string()).event_type("error");
                    break;
                }
            }
        }
    };

    SSE::new(sse_stream)
        .keep_alive(Duration::from_secs(15))
        .into_response()
}

#[handler]
async fn result_handler(
    Data(host): Data<&Arc<PluginHost>>,
    Json(result): Json<TaskResult<EventReply>>,
) -> StatusCode {
    match host.submit_reply_internal(result).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            error!("Error submitting reply: {e:?}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Routes serving `host` under `base_path`.
pub fn create_routes(host: Arc<PluginHost>, base_path: &str) -> impl Endpoint {
    Route::new()
        .at(format!("{base_path}/register"), post(register_handler))
        .at(format!("{base_path}/events/:plugin_id"), get(events_handler))
        .at(format!("{base_path}/result"), post(result_handler))
        .data(host)
}
