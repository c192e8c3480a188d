//! Wires the relay plugin to the plugin host and runs it.

use std::sync::Arc;
use std::thread;

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use nri_stub::CommResult;
use nri_stub::Plugin;
use nri_stub::StopReason;
use nri_stub::Stub;
use nri_stub::StubConfig;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::Cli;
use crate::platform::k8s::KubePodSource;
use crate::platform::kube_client;
use crate::relay::PodMetadataRelay;

/// Run the plugin until the host closes the connection or a termination
/// signal arrives.
///
/// The Kubernetes client is built before the plugin registers with the host,
/// so a bad kubeconfig fails here without the host ever seeing the plugin.
pub async fn run(cli: Cli) -> Result<()> {
    let client = kube_client::init_kube_client(&cli.kubeconfig)
        .await
        .map_err(|e| anyhow!("Failed to create Kubernetes client: {e:?}"))?;

    let mut source = KubePodSource::new(client, Handle::current());
    if let Some(timeout) = cli.fetch_timeout {
        source = source.with_timeout(timeout);
    }
    let relay = Arc::new(PodMetadataRelay::new(source).with_eviction(cli.evict_on_remove));

    let token = CancellationToken::new();
    let done = spawn_stub(relay, cli.stub_config(), token.clone())?;

    tokio::select! {
        result = done => match result {
            Ok(Ok(reason)) => {
                tracing::info!(%reason, "Plugin stub stopped, exiting");
                Ok(())
            }
            Ok(Err(e)) => Err(anyhow!("Plugin exited with error: {e:?}")),
            Err(_) => Err(anyhow!("Plugin stub thread terminated unexpectedly")),
        },
        signal = shutdown_signal() => {
            signal?;
            token.cancel();
            tracing::info!("Plugin stopped");
            Ok(())
        }
    }
}

/// Run the blocking stub on its own thread. The receiver completes when
/// [`Stub::run`] returns.
fn spawn_stub<P>(
    plugin: Arc<P>,
    config: StubConfig,
    token: CancellationToken,
) -> Result<oneshot::Receiver<CommResult<StopReason>>>
where
    P: Plugin + 'static,
{
    let (done_tx, done_rx) = oneshot::channel();
    thread::Builder::new()
        .name("nri-stub".to_string())
        .spawn(move || {
            // the blocking HTTP client must be created off the async runtime
            let result = Stub::new(plugin, config).and_then(|stub| stub.run(token));
            let _ = done_tx.send(result);
        })
        .context("failed to spawn plugin stub thread")?;
    Ok(done_rx)
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::signal;
        use tokio::signal::unix::SignalKind;

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C, shutting down");
    }
    Ok(())
}
