//! Synchronous pod reads from the API server.

use std::time::Duration;

use error_stack::Report;
use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::Client;
use tokio::runtime::Handle;
use tracing::debug;

use crate::platform::k8s::KubernetesError;

/// Source of pod objects, keyed by namespace and name.
///
/// Reads are blocking. Implementations are called from the plugin stub
/// thread, outside of the async runtime.
pub trait PodMetadataSource: Send + Sync {
    fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, Report<KubernetesError>>;
}

/// [`PodMetadataSource`] backed by the Kubernetes API server.
pub struct KubePodSource {
    client: Client,
    runtime: Handle,
    timeout: Option<Duration>,
}

impl KubePodSource {
    /// `runtime` drives the client's requests, it must outlive the source.
    pub fn new(client: Client, runtime: Handle) -> Self {
        Self {
            client,
            runtime,
            timeout: None,
        }
    }

    /// Bound every read by `timeout`. Reads are unbounded by default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl PodMetadataSource for KubePodSource {
    fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, Report<KubernetesError>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        debug!(%namespace, pod_name = %name, "Getting pod from API server");

        // the timer must be created inside the runtime, this thread has no reactor
        let result = match self.timeout {
            Some(timeout) => self
                .runtime
                .block_on(async { tokio::time::timeout(timeout, api.get(name)).await })
                .map_err(|_| {
                    Report::new(KubernetesError::Timeout {
                        namespace: namespace.to_string(),
                        pod_name: name.to_string(),
                        seconds: timeout.as_secs(),
                    })
                })?,
            None => self.runtime.block_on(api.get(name)),
        };

        result.map_err(|e| api_error(e, namespace, name))
    }
}

fn api_error(err: kube::Error, namespace: &str, name: &str) -> Report<KubernetesError> {
    let namespace = namespace.to_string();
    let pod_name = name.to_string();
    let context = match &err {
        kube::Error::Api(response) if response.code == 404 => {
            KubernetesError::PodNotFound { namespace, pod_name }
        }
        _ => KubernetesError::FetchFailed { namespace, pod_name },
    };

    Report::new(context).attach_printable(format!("Kubernetes API error: {err}"))
}

#[cfg(test)]
mod tests {
    use kube::error::ErrorResponse;

    use super::*;

    fn api_response(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "pods \"web-1\" not found".to_string(),
            reason: "NotFound".to_string(),
            code,
        })
    }

    #[test]
    fn not_found_is_distinguished() {
        let report = api_error(api_response(404), "default", "web-1");

        assert!(matches!(
            report.current_context(),
            KubernetesError::PodNotFound { namespace, pod_name }
                if namespace == "default" && pod_name == "web-1"
        ));
        assert_eq!(report.current_context().to_string(), "Pod default/web-1 not found");
    }

    #[test]
    fn other_api_errors_are_fetch_failures() {
        let report = api_error(api_response(500), "default", "web-1");

        assert!(matches!(
            report.current_context(),
            KubernetesError::FetchFailed { .. }
        ));
    }
}
