use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use nri_stub::config::DEFAULT_BASE_PATH;
use nri_stub::StubConfig;
use utils::version;

/// NRI plugin annotating containers with the Kubernetes object of their pod.
#[derive(Parser, Clone, Debug)]
#[command(version = &**version::VERSION)]
pub struct Cli {
    #[arg(
        long,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Absolute path to the kubeconfig file"
    )]
    pub kubeconfig: PathBuf,

    #[arg(
        long,
        env = "NRI_HOST_URL",
        default_value = "http://127.0.0.1:8877",
        help = "URL of the plugin host"
    )]
    pub host_url: String,

    #[arg(
        long,
        default_value = DEFAULT_BASE_PATH,
        help = "Path the plugin host serves its routes under"
    )]
    pub host_base_path: String,

    #[arg(long, default_value = "podresources", help = "Plugin name reported to the host")]
    pub plugin_name: String,

    #[arg(
        long,
        default_value = "10",
        help = "Plugin index, orders plugins on the host"
    )]
    pub plugin_idx: String,

    #[arg(
        long,
        help = "Drop cached pod metadata when the pod sandbox is removed",
        default_value_t = false,
        action = clap::ArgAction::Set
    )]
    pub evict_on_remove: bool,

    #[arg(
        long,
        value_parser = parse_seconds,
        help = "Timeout in seconds for reading a pod from the API server, unbounded when unset"
    )]
    pub fetch_timeout: Option<Duration>,

    #[arg(
        long,
        env = "NRI_PODRESOURCES_LOG_FILE",
        value_hint = clap::ValueHint::FilePath,
        help = "Also write logs to this file, rotated daily"
    )]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn stub_config(&self) -> StubConfig {
        StubConfig::new(self.host_url.clone(), self.plugin_name.clone())
            .with_base_path(self.host_base_path.clone())
            .with_plugin_idx(self.plugin_idx.clone())
    }
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let seconds: u64 = s
        .parse()
        .map_err(|e| format!("Failed to parse seconds from '{s}': {e}"))?;
    if seconds == 0 {
        return Err("Timeout must be at least one second".to_string());
    }
    Ok(Duration::from_secs(seconds))
}
