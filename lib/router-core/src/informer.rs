//! Informer: turns a kube-runtime watch stream into add/update/delete callbacks

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use kube::Resource;
use kube_runtime::watcher;
use router_api::ObjectKey;
use std::collections::{HashMap, HashSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Callbacks invoked for one watched kind
#[async_trait]
pub trait ResourceEventHandler<K: Send + Sync>: Send + Sync {
    async fn on_add(&self, obj: &K);

    async fn on_update(&self, old: &K, new: &K);

    async fn on_delete(&self, obj: &K);

    /// The initial listing (or a relist) has been fully delivered
    fn on_synced(&self) {}
}

/// Informer remembers the last version of every watched object so updates
/// carry the previous state and relists can detect objects that disappeared
/// while the watch was disconnected.
pub struct Informer<K> {
    known: HashMap<ObjectKey, K>,
    relist: Option<HashSet<ObjectKey>>,
}

impl<K> Informer<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            known: HashMap::new(),
            relist: None,
        }
    }

    fn kind() -> String {
        K::kind(&()).to_string()
    }

    /// Number of objects currently known to the informer
    pub fn known(&self) -> usize {
        self.known.len()
    }

    pub async fn handle<H>(&mut self, event: watcher::Event<K>, handler: &H)
    where
        H: ResourceEventHandler<K> + ?Sized,
    {
        match event {
            watcher::Event::Apply(obj) => self.apply(obj, handler).await,
            watcher::Event::Delete(obj) => {
                self.known.remove(&ObjectKey::of(&obj));
                handler.on_delete(&obj).await;
            }
            watcher::Event::Init => {
                debug!(kind = %Self::kind(), "Relist started");
                self.relist = Some(HashSet::new());
            }
            watcher::Event::InitApply(obj) => {
                if let Some(seen) = self.relist.as_mut() {
                    seen.insert(ObjectKey::of(&obj));
                }
                self.apply(obj, handler).await;
            }
            watcher::Event::InitDone => {
                let seen = self.relist.take().unwrap_or_default();
                let vanished: Vec<ObjectKey> = self
                    .known
                    .keys()
                    .filter(|key| !seen.contains(*key))
                    .cloned()
                    .collect();
                for key in vanished {
                    if let Some(obj) = self.known.remove(&key) {
                        debug!(kind = %Self::kind(), key = %key, "Object vanished during relist");
                        handler.on_delete(&obj).await;
                    }
                }
                info!(kind = %Self::kind(), objects = self.known.len(), "Informer synced");
                handler.on_synced();
            }
        }
    }

    async fn apply<H>(&mut self, obj: K, handler: &H)
    where
        H: ResourceEventHandler<K> + ?Sized,
    {
        match self.known.insert(ObjectKey::of(&obj), obj.clone()) {
            Some(old) => handler.on_update(&old, &obj).await,
            None => handler.on_add(&obj).await,
        }
    }

    /// Feed `stream` into `handler` until the stream ends or `shutdown` fires.
    /// Stream errors are logged; the watcher's backoff takes care of reconnecting.
    pub async fn run<S, H>(mut self, stream: S, handler: &H, shutdown: CancellationToken)
    where
        S: Stream<Item = Result<watcher::Event<K>, watcher::Error>> + Send,
        H: ResourceEventHandler<K> + ?Sized,
    {
        tokio::pin!(stream);
        info!(kind = %Self::kind(), "Starting informer");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                next = stream.next() => match next {
                    Some(Ok(event)) => self.handle(event, handler).await,
                    Some(Err(e)) => warn!(kind = %Self::kind(), error = %e, "Watch stream error"),
                    None => {
                        warn!(kind = %Self::kind(), "Watch stream ended");
                        break;
                    }
                },
            }
        }

        info!(kind = %Self::kind(), "Informer stopped");
    }
}

impl<K> Default for Informer<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::service;
    use k8s_openapi::api::core::v1::Service;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        synced: AtomicBool,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn ips(svc: &Service) -> String {
        crate::filters::service_external_ips(svc).join(",")
    }

    #[async_trait]
    impl ResourceEventHandler<Service> for Recorder {
        async fn on_add(&self, obj: &Service) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("add {} [{}]", ObjectKey::of(obj), ips(obj)));
        }

        async fn on_update(&self, old: &Service, new: &Service) {
            self.calls.lock().unwrap().push(format!(
                "update {} [{}] -> [{}]",
                ObjectKey::of(new),
                ips(old),
                ips(new)
            ));
        }

        async fn on_delete(&self, obj: &Service) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("delete {}", ObjectKey::of(obj)));
        }

        fn on_synced(&self) {
            self.synced.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_apply_then_update_carries_old_object() {
        let recorder = Recorder::default();
        let mut informer = Informer::new();

        informer
            .handle(watcher::Event::Apply(service("default", "web", &["1.2.3.4"])), &recorder)
            .await;
        informer
            .handle(watcher::Event::Apply(service("default", "web", &["5.6.7.8"])), &recorder)
            .await;
        informer
            .handle(watcher::Event::Delete(service("default", "web", &["5.6.7.8"])), &recorder)
            .await;

        assert_eq!(
            recorder.calls(),
            vec![
                "add default/web [1.2.3.4]",
                "update default/web [1.2.3.4] -> [5.6.7.8]",
                "delete default/web",
            ]
        );
        assert_eq!(informer.known(), 0);
    }

    #[tokio::test]
    async fn test_relist_deletes_vanished_objects() {
        let recorder = Recorder::default();
        let mut informer = Informer::new();

        informer.handle(watcher::Event::Init, &recorder).await;
        informer
            .handle(watcher::Event::InitApply(service("default", "web", &["1.2.3.4"])), &recorder)
            .await;
        informer
            .handle(watcher::Event::InitApply(service("default", "api", &["1.2.3.5"])), &recorder)
            .await;
        informer.handle(watcher::Event::InitDone, &recorder).await;
        assert!(recorder.synced.load(Ordering::SeqCst));

        // Reconnect: "api" was deleted while the watch was down.
        informer.handle(watcher::Event::Init, &recorder).await;
        informer
            .handle(watcher::Event::InitApply(service("default", "web", &["1.2.3.4"])), &recorder)
            .await;
        informer.handle(watcher::Event::InitDone, &recorder).await;

        let calls = recorder.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[2], "update default/web [1.2.3.4] -> [1.2.3.4]");
        assert_eq!(calls[3], "delete default/api");
        assert_eq!(informer.known(), 1);
    }

    #[tokio::test]
    async fn test_run_consumes_stream_and_skips_errors() {
        let recorder = Recorder::default();
        let events = vec![
            Ok(watcher::Event::Init),
            Ok(watcher::Event::InitApply(service("default", "web", &["1.2.3.4"]))),
            Err(watcher::Error::NoResourceVersion),
            Ok(watcher::Event::InitDone),
        ];

        Informer::new()
            .run(futures::stream::iter(events), &recorder, CancellationToken::new())
            .await;

        assert_eq!(recorder.calls(), vec!["add default/web [1.2.3.4]"]);
        assert!(recorder.synced.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let recorder = Recorder::default();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        Informer::<Service>::new()
            .run(futures::stream::pending(), &recorder, shutdown)
            .await;

        assert!(recorder.calls().is_empty());
    }
}
