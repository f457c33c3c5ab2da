//! Integration tests for ModelStore persistence and HotSwapController
//! atomic replacement.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vesta::models::{
    ClassRef, HotSwapController, ManagedObject, ModelStore, ObjectError, Registry, SemVer,
    Serialized, StoreError, SwapError, SwapOutcome,
};
use vesta::storage::{
    LocalFilesystemBackend, MemoryObjectStore, ObjectLocation, ObjectStorageBackend,
    StorageBackend, StorageError,
};

/// Model whose weights are internally consistent: every element equals
/// `fill`. A torn or half-loaded instance would break that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Embedding {
    label: String,
    fill: u32,
    weights: Vec<u32>,
}

impl Embedding {
    fn new(label: &str, fill: u32) -> Managed {
        Serialized(Self { label: label.to_string(), fill, weights: vec![fill; 2048] })
    }

    fn is_consistent(&self) -> bool {
        self.weights.len() == 2048 && self.weights.iter().all(|w| *w == self.fill)
    }
}

type Managed = Serialized<Embedding>;

fn v(s: &str) -> SemVer {
    SemVer::parse(s).unwrap()
}

struct Fixture {
    store: Arc<ModelStore>,
    controller: Arc<HotSwapController>,
    objects: Arc<ObjectStorageBackend<Arc<MemoryObjectStore>>>,
    memory: Arc<MemoryObjectStore>,
}

async fn fixture(versions: &[(&str, u32)]) -> Fixture {
    let registry = Arc::new(Registry::new());
    let memory = Arc::new(MemoryObjectStore::new());
    let objects = Arc::new(ObjectStorageBackend::new(
        Arc::clone(&memory),
        ObjectLocation::parse("s3://models/test").unwrap(),
    ));
    let store = Arc::new(ModelStore::new(Arc::clone(&registry), objects.clone()));

    for (ver, fill) in versions {
        registry
            .register_str("embedding", ver, Some(">=1.0,<3.0"), ClassRef::of::<Managed>())
            .unwrap();
        store.save("embedding", &v(ver), &Embedding::new(ver, *fill)).await.unwrap();
    }

    let controller = Arc::new(HotSwapController::new(Arc::clone(&store)));
    Fixture { store, controller, objects, memory }
}

#[tokio::test]
async fn save_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(Registry::new());
    let backend = Arc::new(LocalFilesystemBackend::open(dir.path()).await.unwrap());
    let store = ModelStore::new(Arc::clone(&registry), backend);

    let record = registry
        .register_str("embedding", "1.1.4-alpha", Some(">=1.0,<3.0"), ClassRef::of::<Managed>())
        .unwrap();
    let original = Embedding::new("user", 42);
    let key = store.save("embedding", &record.version, &original).await.unwrap();
    assert_eq!(key.to_string(), "embedding/1.1.4-alpha");

    let loaded = store.load(&record).await.unwrap();
    let restored = loaded.object.downcast::<Managed>().unwrap();
    assert_eq!(*restored, original);
    assert_eq!(loaded.digest.len(), 64);
}

#[tokio::test]
async fn save_requires_registration() {
    let f = fixture(&[]).await;
    let result = f.store.save("embedding", &v("1.0.0"), &Embedding::new("x", 1)).await;
    assert!(matches!(result, Err(StoreError::Registry(_))));
    assert_eq!(f.memory.object_count(), 0);
}

#[tokio::test]
async fn stored_versions_ignore_foreign_keys() {
    let f = fixture(&[("1.0.0", 1), ("2.0.0", 2)]).await;
    f.objects.write("embedding/not-a-version", vec![0]).await.unwrap();
    f.objects.write("embedding-v2/1.0.0", vec![0]).await.unwrap();
    assert_eq!(f.store.stored_versions("embedding").await.unwrap(), vec![v("1.0.0"), v("2.0.0")]);
}

#[tokio::test]
async fn first_access_loads_latest() {
    let f = fixture(&[("1.0.0", 1), ("1.5.0", 15), ("2.0.0", 2)]).await;
    let active = f.controller.get_active::<Managed>("embedding").await.unwrap();
    assert_eq!(active.label, "2.0.0");
    assert_eq!(f.controller.active_version("embedding"), Some(v("2.0.0")));
}

#[tokio::test]
async fn swap_to_explicit_version_and_back() {
    let f = fixture(&[("1.0.0", 1), ("2.0.0", 2)]).await;
    f.controller.get_active::<Managed>("embedding").await.unwrap();

    let outcome = f.controller.swap("embedding", Some(&v("1.0.0"))).await.unwrap();
    assert_eq!(outcome, SwapOutcome::Swapped { previous: Some(v("2.0.0")), current: v("1.0.0") });
    assert_eq!(f.controller.get_active::<Managed>("embedding").await.unwrap().fill, 1);

    let outcome = f.controller.swap("embedding", None).await.unwrap();
    assert_eq!(outcome, SwapOutcome::Swapped { previous: Some(v("1.0.0")), current: v("2.0.0") });
}

#[tokio::test]
async fn old_handles_survive_swap() {
    let f = fixture(&[("1.0.0", 1), ("2.0.0", 2)]).await;
    f.controller.swap("embedding", Some(&v("1.0.0"))).await.unwrap();
    let old = f.controller.get_active::<Managed>("embedding").await.unwrap();

    f.controller.swap("embedding", Some(&v("2.0.0"))).await.unwrap();
    let new = f.controller.get_active::<Managed>("embedding").await.unwrap();

    assert_eq!(old.fill, 1);
    assert!(old.is_consistent());
    assert_eq!(new.fill, 2);
}

#[tokio::test]
async fn failed_swap_keeps_previous_instance() {
    let f = fixture(&[("1.0.0", 1), ("2.0.0", 2)]).await;
    f.controller.swap("embedding", Some(&v("1.0.0"))).await.unwrap();

    // Unregistered version.
    let err = f.controller.swap("embedding", Some(&v("2.5.0"))).await.unwrap_err();
    assert!(matches!(err, SwapError::Registry(_)));
    assert_eq!(f.controller.active_version("embedding"), Some(v("1.0.0")));

    // Storage outage.
    f.memory.set_available(false);
    let err = f.controller.swap("embedding", Some(&v("2.0.0"))).await.unwrap_err();
    assert!(matches!(err, SwapError::Storage(StorageError::Unavailable { .. })));
    assert_eq!(f.controller.active_version("embedding"), Some(v("1.0.0")));
    assert_eq!(f.controller.get_active::<Managed>("embedding").await.unwrap().fill, 1);
    f.memory.set_available(true);

    // Corrupt bytes.
    f.objects.write("embedding/2.0.0", b"{not json".to_vec()).await.unwrap();
    let err = f.controller.swap("embedding", Some(&v("2.0.0"))).await.unwrap_err();
    assert!(matches!(err, SwapError::Object(ObjectError::Decode(_))));
    assert_eq!(f.controller.active_version("embedding"), Some(v("1.0.0")));
}

#[tokio::test]
async fn missing_bytes_surface_key_not_found() {
    let f = fixture(&[("1.0.0", 1)]).await;
    f.objects.delete("embedding/1.0.0").await.unwrap();
    let err = f.controller.get_active::<Managed>("embedding").await.unwrap_err();
    assert!(matches!(err, SwapError::Storage(StorageError::KeyNotFound(_))));
}

#[tokio::test]
async fn unchanged_swap_detected_by_digest() {
    let f = fixture(&[("1.0.0", 1)]).await;
    f.controller.get_active::<Managed>("embedding").await.unwrap();
    let digest = f.controller.active_info("embedding").unwrap().digest;

    assert_eq!(f.controller.swap("embedding", None).await.unwrap(), SwapOutcome::Unchanged(v("1.0.0")));

    // Re-uploading different bytes under the same version is picked up.
    f.store.save("embedding", &v("1.0.0"), &Embedding::new("patched", 7)).await.unwrap();
    let outcome = f.controller.swap("embedding", None).await.unwrap();
    assert!(matches!(outcome, SwapOutcome::Swapped { .. }));
    assert_ne!(f.controller.active_info("embedding").unwrap().digest, digest);
    assert_eq!(f.controller.get_active::<Managed>("embedding").await.unwrap().fill, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_readers_never_observe_partial_instance() {
    let f = fixture(&[("1.0.0", 1), ("2.0.0", 2)]).await;
    f.controller.get_active::<Managed>("embedding").await.unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let controller = Arc::clone(&f.controller);
            let stop = Arc::clone(&stop);
            tokio::spawn(async move {
                let mut observed = 0usize;
                while !stop.load(Ordering::Relaxed) {
                    let active = controller.get_active::<Managed>("embedding").await.unwrap();
                    assert!(active.is_consistent(), "observed a torn instance");
                    assert!(active.fill == 1 || active.fill == 2);
                    observed += 1;
                    tokio::task::yield_now().await;
                }
                observed
            })
        })
        .collect();

    for i in 0..20 {
        let target = if i % 2 == 0 { "1.0.0" } else { "2.0.0" };
        f.controller.swap("embedding", Some(&v(target))).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    stop.store(true, Ordering::Relaxed);

    for r in readers {
        assert!(r.await.unwrap() > 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_swaps_leave_one_complete_version() {
    let f = fixture(&[("1.0.0", 1), ("1.5.0", 15), ("2.0.0", 2)]).await;
    let requested = ["1.0.0", "1.5.0", "2.0.0", "1.5.0"];

    let swaps: Vec<_> = requested
        .iter()
        .map(|ver| {
            let controller = Arc::clone(&f.controller);
            let ver = v(ver);
            tokio::spawn(async move { controller.swap("embedding", Some(&ver)).await })
        })
        .collect();
    for s in futures::future::join_all(swaps).await {
        s.unwrap().unwrap();
    }

    // Whatever order the swaps ran in, the active instance is one complete
    // requested version and its label matches the published record.
    let active = f.controller.get_active::<Managed>("embedding").await.unwrap();
    assert!(active.is_consistent());
    assert!(requested.contains(&active.label.as_str()));
    assert_eq!(f.controller.active_version("embedding").map(|v| v.to_string()), Some(active.label.clone()));
}

#[tokio::test]
async fn sequential_swaps_publish_the_last_requested() {
    let f = fixture(&[("1.0.0", 1), ("1.5.0", 15), ("2.0.0", 2)]).await;
    let mut published = Vec::new();

    for ver in ["2.0.0", "1.0.0", "1.5.0", "1.5.0", "2.0.0", "1.0.0"] {
        match f.controller.swap("embedding", Some(&v(ver))).await.unwrap() {
            SwapOutcome::Swapped { current, .. } => published.push(current),
            SwapOutcome::Unchanged(current) => assert_eq!(published.last(), Some(&current)),
        }
        assert_eq!(f.controller.active_version("embedding"), Some(v(ver)));
    }

    assert_eq!(published.len(), 5);
    assert_eq!(f.controller.get_active::<Managed>("embedding").await.unwrap().fill, 1);
}

#[tokio::test]
async fn type_mismatch_reported() {
    struct Other;
    impl ManagedObject for Other {
        fn save(&self, _sink: &mut dyn Write) -> Result<(), ObjectError> {
            Ok(())
        }
        fn load(_source: &mut dyn Read) -> Result<Self, ObjectError> {
            Ok(Other)
        }
    }

    let f = fixture(&[("1.0.0", 1)]).await;
    let err = f.controller.get_active::<Other>("embedding").await.err().unwrap();
    assert!(matches!(err, SwapError::TypeMismatch { .. }));
}

#[tokio::test]
async fn evict_then_reload() {
    let f = fixture(&[("1.0.0", 1)]).await;
    f.controller.get_active::<Managed>("embedding").await.unwrap();
    assert!(f.controller.evict("embedding").is_some());
    assert!(f.controller.active_version("embedding").is_none());
    assert_eq!(f.controller.active_names(), Vec::<String>::new());

    f.controller.get_active::<Managed>("embedding").await.unwrap();
    assert_eq!(f.controller.active_names(), vec!["embedding".to_string()]);
}
