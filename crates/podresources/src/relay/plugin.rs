use nri_stub::Container;
use nri_stub::ContainerCreateAdjustment;
use nri_stub::CreateContainerResponse;
use nri_stub::EventMask;
use nri_stub::HandlerResult;
use nri_stub::Plugin;
use nri_stub::PodSandbox;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::platform::k8s::KubernetesError;
use crate::platform::k8s::PodMetadataSource;
use crate::relay::cache::PodKey;
use crate::relay::cache::PodMetadataCache;

/// Annotation carrying the serialized pod object.
pub const POD_DATA_ANNOTATION: &str = "poddata";

/// Relays pod objects from the API server into container annotations.
///
/// On `RunPodSandbox` the pod is read from `source` and cached as JSON. On
/// `CreateContainer` the cached JSON of the container's pod, if any, is added
/// to the container's annotations under [`POD_DATA_ANNOTATION`].
pub struct PodMetadataRelay<S> {
    source: S,
    cache: PodMetadataCache,
    evict_on_remove: bool,
}

impl<S> PodMetadataRelay<S>
where S: PodMetadataSource
{
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: PodMetadataCache::new(),
            evict_on_remove: false,
        }
    }

    /// Also subscribe to `RemovePodSandbox` and drop the pod's entry then.
    pub fn with_eviction(mut self, evict_on_remove: bool) -> Self {
        self.evict_on_remove = evict_on_remove;
        self
    }

    pub fn cache(&self) -> &PodMetadataCache {
        &self.cache
    }

    /// Events this plugin asks the host for.
    pub fn subscriptions(&self) -> EventMask {
        let mut mask = EventMask::RUN_POD_SANDBOX | EventMask::CREATE_CONTAINER;
        if self.evict_on_remove {
            mask |= EventMask::REMOVE_POD_SANDBOX;
        }
        mask
    }

    /// Fetch the pod and cache its JSON. Failures leave the cache untouched.
    fn refresh(&self, pod: &PodSandbox) {
        let key = PodKey::from(pod);

        let k8s_pod = match self.source.get_pod(&pod.namespace, &pod.name) {
            Ok(k8s_pod) => k8s_pod,
            Err(report) => {
                match report.current_context() {
                    KubernetesError::PodNotFound { .. } => {
                        warn!(pod = %key, "Pod not found, no metadata cached: {report:?}")
                    }
                    _ => error!(pod = %key, "Failed to get pod: {report:?}"),
                }
                return;
            }
        };

        match serde_json::to_string(&k8s_pod) {
            Ok(json) => {
                debug!(pod = %key, metadata = %json, "Fetched pod metadata");
                if self.cache.insert(key.clone(), json).is_some() {
                    debug!(pod = %key, "Replaced cached pod metadata");
                }
            }
            Err(e) => error!(pod = %key, "Failed to serialize pod: {e}"),
        }
    }
}

impl<S> Plugin for PodMetadataRelay<S>
where S: PodMetadataSource
{
    fn configure(&self, config: &str) -> HandlerResult<EventMask> {
        let mask = self.subscriptions();
        info!(config = %config, events = %mask, "Configuring plugin");
        Ok(mask)
    }

    fn run_pod_sandbox(&self, pod: &PodSandbox) {
        info!(pod = %PodKey::from(pod), "RunPodSandbox");
        self.refresh(pod);
    }

    fn remove_pod_sandbox(&self, pod: &PodSandbox) {
        if !self.evict_on_remove {
            return;
        }
        let key = PodKey::from(pod);
        if self.cache.remove(&key).is_some() {
            debug!(pod = %key, "Evicted pod metadata");
        }
    }

    fn create_container(
        &self,
        pod: &PodSandbox,
        container: &Container,
    ) -> HandlerResult<CreateContainerResponse> {
        let key = PodKey::from(pod);
        let Some(metadata) = self.cache.get(&key) else {
            debug!(pod = %key, container = %container.name, "No pod metadata cached");
            return Ok(CreateContainerResponse::default());
        };

        let mut annotations = container.annotations.clone();
        annotations.insert(POD_DATA_ANNOTATION.to_string(), metadata);
        info!(pod = %key, container = %container.name, "Injecting pod metadata");

        Ok(CreateContainerResponse {
            adjustment: Some(ContainerCreateAdjustment { annotations }),
            updates: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use error_stack::Report;
    use k8s_openapi::api::core::v1::Pod;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use nri_stub::dispatch;
    use nri_stub::Event;
    use nri_stub::EventKind;
    use nri_stub::EventReply;
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;

    /// In-memory pods. Missing pods are reported as not found.
    #[derive(Default)]
    struct FakePods {
        pods: Mutex<HashMap<String, Pod>>,
        reads: Mutex<usize>,
    }

    impl FakePods {
        fn put(&self, pod: Pod) {
            let key = format!(
                "{}/{}",
                pod.metadata.namespace.as_deref().unwrap_or_default(),
                pod.metadata.name.as_deref().unwrap_or_default()
            );
            self.pods.lock().unwrap().insert(key, pod);
        }

        fn reads(&self) -> usize {
            *self.reads.lock().unwrap()
        }
    }

    impl PodMetadataSource for FakePods {
        fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, Report<KubernetesError>> {
            *self.reads.lock().unwrap() += 1;
            self.pods
                .lock()
                .unwrap()
                .get(&format!("{namespace}/{name}"))
                .cloned()
                .ok_or_else(|| {
                    Report::new(KubernetesError::PodNotFound {
                        namespace: namespace.to_string(),
                        pod_name: name.to_string(),
                    })
                })
        }
    }

    fn k8s_pod(namespace: &str, name: &str, revision: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                namespace: Some(namespace.to_string()),
                name: Some(name.to_string()),
                labels: Some(BTreeMap::from([(
                    "revision".to_string(),
                    revision.to_string(),
                )])),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn container(id: &str) -> Container {
        Container {
            id: id.to_string(),
            name: id.to_string(),
            ..Default::default()
        }
    }

    fn poddata(response: &CreateContainerResponse) -> Option<&str> {
        response
            .adjustment
            .as_ref()?
            .annotations
            .get(POD_DATA_ANNOTATION)
            .map(String::as_str)
    }

    #[test]
    fn cached_pod_is_injected_into_container() {
        let source = FakePods::default();
        let pod = k8s_pod("default", "web-1", "1");
        let expected = serde_json::to_string(&pod).unwrap();
        source.put(pod);
        let relay = PodMetadataRelay::new(source);
        let sandbox = PodSandbox::new("default", "web-1");

        relay.run_pod_sandbox(&sandbox);
        let response = relay
            .create_container(&sandbox, &container("c1"))
            .expect("create should not fail");

        let annotations = &response.adjustment.as_ref().unwrap().annotations;
        assert_eq!(
            annotations,
            &BTreeMap::from([(POD_DATA_ANNOTATION.to_string(), expected)])
        );
        assert!(response.updates.is_empty());
    }

    #[test]
    fn existing_annotations_are_kept() {
        let source = FakePods::default();
        source.put(k8s_pod("default", "web-1", "1"));
        let relay = PodMetadataRelay::new(source);
        let sandbox = PodSandbox::new("default", "web-1");
        let mut c1 = container("c1");
        c1.annotations
            .insert("io.kubernetes.container.name".to_string(), "c1".to_string());

        relay.run_pod_sandbox(&sandbox);
        let response = relay.create_container(&sandbox, &c1).unwrap();

        let annotations = &response.adjustment.as_ref().unwrap().annotations;
        assert_eq!(annotations.len(), 2);
        assert_eq!(
            annotations.get("io.kubernetes.container.name"),
            Some(&"c1".to_string())
        );
        assert!(poddata(&response).is_some());
    }

    #[test]
    fn unknown_pod_yields_no_adjustment() {
        let relay = PodMetadataRelay::new(FakePods::default());
        let sandbox = PodSandbox::new("default", "web-1");

        let response = relay
            .create_container(&sandbox, &container("c1"))
            .expect("create should not fail");

        assert!(response.is_empty());
    }

    #[test]
    fn failed_fetch_is_swallowed() {
        let relay = PodMetadataRelay::new(FakePods::default());
        let sandbox = PodSandbox::new("default", "gone");

        relay.run_pod_sandbox(&sandbox);

        assert!(relay.cache().is_empty());
        let response = relay.create_container(&sandbox, &container("c1")).unwrap();
        assert!(response.is_empty());
    }

    #[test]
    fn failed_fetch_keeps_previous_entry() {
        let relay = PodMetadataRelay::new(FakePods::default());
        let sandbox = PodSandbox::new("default", "web-1");
        relay
            .cache()
            .insert(PodKey::from(&sandbox), "previous".to_string());

        relay.run_pod_sandbox(&sandbox);

        let response = relay.create_container(&sandbox, &container("c1")).unwrap();
        assert_eq!(poddata(&response), Some("previous"));
    }

    #[test]
    fn second_fetch_overwrites_first() {
        let relay = PodMetadataRelay::new(FakePods::default());
        let sandbox = PodSandbox::new("default", "web-1");

        relay.source.put(k8s_pod("default", "web-1", "1"));
        relay.run_pod_sandbox(&sandbox);

        let newer = k8s_pod("default", "web-1", "2");
        let expected = serde_json::to_string(&newer).unwrap();
        relay.source.put(newer);
        relay.run_pod_sandbox(&sandbox);

        let response = relay.create_container(&sandbox, &container("c1")).unwrap();
        assert_eq!(poddata(&response), Some(expected.as_str()));
        assert_eq!(relay.source.reads(), 2);
    }

    #[test]
    fn create_container_does_not_fetch() {
        let relay = PodMetadataRelay::new(FakePods::default());
        let sandbox = PodSandbox::new("default", "web-1");

        relay.create_container(&sandbox, &container("c1")).unwrap();

        assert_eq!(relay.source.reads(), 0);
    }

    #[test]
    fn subscribes_to_sandbox_and_container_creation() {
        let relay = PodMetadataRelay::new(FakePods::default());

        let mask = relay.configure("").expect("configure should not fail");

        assert_eq!(mask.kinds().collect::<Vec<_>>(), vec![
            EventKind::RunPodSandbox,
            EventKind::CreateContainer
        ]);
    }

    #[test]
    fn eviction_adds_remove_subscription() {
        let relay = PodMetadataRelay::new(FakePods::default()).with_eviction(true);

        let mask = relay.configure("").unwrap();

        assert!(mask.contains(EventKind::RemovePodSandbox));
        assert!(!mask.contains(EventKind::StopPodSandbox));
    }

    #[test]
    fn removal_is_ignored_without_eviction() {
        let source = FakePods::default();
        source.put(k8s_pod("default", "web-1", "1"));
        let relay = PodMetadataRelay::new(source);
        let sandbox = PodSandbox::new("default", "web-1");
        relay.run_pod_sandbox(&sandbox);

        let mask = relay.configure("").unwrap();
        let result = dispatch(&relay, mask, &Event::RemovePodSandbox {
            pod: sandbox.clone(),
        });

        assert!(result.is_err());
        assert!(relay.cache().contains(&PodKey::from(&sandbox)));
    }

    #[test]
    fn direct_removal_keeps_entry_without_eviction() {
        let source = FakePods::default();
        source.put(k8s_pod("default", "web-1", "1"));
        let relay = PodMetadataRelay::new(source);
        let sandbox = PodSandbox::new("default", "web-1");
        relay.run_pod_sandbox(&sandbox);

        relay.remove_pod_sandbox(&sandbox);

        let response = relay.create_container(&sandbox, &container("c1")).unwrap();
        assert!(poddata(&response).is_some());
    }

    #[test]
    fn removal_evicts_with_eviction() {
        let source = FakePods::default();
        source.put(k8s_pod("default", "web-1", "1"));
        let relay = PodMetadataRelay::new(source).with_eviction(true);
        let sandbox = PodSandbox::new("default", "web-1");
        relay.run_pod_sandbox(&sandbox);

        let mask = relay.configure("").unwrap();
        let reply = dispatch(&relay, mask, &Event::RemovePodSandbox {
            pod: sandbox.clone(),
        })
        .expect("subscribed removal should dispatch");

        assert_eq!(reply, EventReply::Acknowledged);
        let response = relay.create_container(&sandbox, &container("c1")).unwrap();
        assert!(response.is_empty());
    }

    #[test]
    fn other_lifecycle_events_are_noops() {
        let source = FakePods::default();
        source.put(k8s_pod("default", "web-1", "1"));
        let relay = PodMetadataRelay::new(source);
        let sandbox = PodSandbox::new("default", "web-1");
        relay.run_pod_sandbox(&sandbox);

        relay.stop_pod_sandbox(&sandbox);
        relay.remove_container(&sandbox, &container("c1"));
        relay.shutdown();
        let updates = relay.stop_container(&sandbox, &container("c1")).unwrap();

        assert!(updates.is_empty());
        assert_eq!(relay.cache().len(), 1);
        assert_eq!(relay.source.reads(), 1);
    }
}
