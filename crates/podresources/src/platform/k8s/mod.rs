//! Kubernetes integration module.
//!
//! Reads pod objects from the API server for the relay plugin.

use core::error::Error;

pub mod pod_source;

pub use pod_source::KubePodSource;
pub use pod_source::PodMetadataSource;

/// Errors that can occur during Kubernetes operations.
#[derive(Debug, derive_more::Display)]
pub enum KubernetesError {
    #[display("Failed to connect to Kubernetes API: {message}")]
    ConnectionFailed { message: String },
    #[display("Pod {namespace}/{pod_name} not found")]
    PodNotFound { namespace: String, pod_name: String },
    #[display("Failed to get pod {namespace}/{pod_name}")]
    FetchFailed { namespace: String, pod_name: String },
    #[display("Getting pod {namespace}/{pod_name} timed out after {seconds}s")]
    Timeout {
        namespace: String,
        pod_name: String,
        seconds: u64,
    },
}

impl Error for KubernetesError {}
