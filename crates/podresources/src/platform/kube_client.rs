use std::path::Path;

use error_stack::Report;
use error_stack::ResultExt;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube::Client;
use kube::Config;

use crate::platform::k8s::KubernetesError;

/// Build a client from the kubeconfig at `kubeconfig_path`.
pub async fn init_kube_client(kubeconfig_path: &Path) -> Result<Client, Report<KubernetesError>> {
    let kubeconfig = Kubeconfig::read_from(kubeconfig_path).change_context(
        KubernetesError::ConnectionFailed {
            message: format!(
                "Failed to read kubeconfig file: {}",
                kubeconfig_path.display()
            ),
        },
    )?;

    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .change_context(KubernetesError::ConnectionFailed {
            message: format!(
                "Failed to create config from kubeconfig: {}",
                kubeconfig_path.display()
            ),
        })?;

    Client::try_from(config).change_context(KubernetesError::ConnectionFailed {
        message: "Failed to create Kubernetes client from kubeconfig".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use test_log::test;

    use super::*;

    #[test(tokio::test)]
    async fn missing_kubeconfig_is_rejected() {
        let err = init_kube_client(Path::new("/nonexistent/kubeconfig"))
            .await
            .err()
            .expect("missing kubeconfig should fail");

        assert!(matches!(
            err.current_context(),
            KubernetesError::ConnectionFailed { .. }
        ));
    }

    #[test(tokio::test)]
    async fn malformed_kubeconfig_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("should create temp file");
        writeln!(file, "clusters: [not closed").expect("should write kubeconfig");

        let result = init_kube_client(file.path()).await;

        assert!(result.is_err());
    }

    #[test(tokio::test)]
    async fn kubeconfig_without_context_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("should create temp file");
        writeln!(file, "apiVersion: v1\nkind: Config\nclusters: []\ncontexts: []\nusers: []")
            .expect("should write kubeconfig");

        let result = init_kube_client(file.path()).await;

        assert!(result.is_err());
    }
}
