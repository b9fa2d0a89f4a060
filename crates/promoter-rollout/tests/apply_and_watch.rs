//! Executor and watcher driven together over an in-memory cluster.

use std::sync::Arc;
use std::time::Duration;

use promoter_core::{ImageNamingConfig, RecordingNotifier, Severity};
use promoter_rollout::*;
use tokio::sync::watch;

#[tokio::test(start_paused = true)]
async fn applied_image_is_what_the_watcher_waits_for() {
    let cluster = InMemoryCluster::new().with_workload("svcA", "registry/repo/svcA:1.0.0");
    cluster.set_pods(
        "svcA",
        vec![healthy_pod("svcA", "svcA-old", "registry/repo/svcA:1.0.0")],
    );
    let notifier = Arc::new(RecordingNotifier::new());
    let executor = RolloutExecutor::new(Arc::new(cluster.clone()), notifier.clone());
    let watcher = ConvergenceWatcher::new(
        Arc::new(cluster.clone()),
        WatchConfig {
            interval: Duration::from_secs(5),
            deadline: Duration::from_secs(60),
        },
    );

    let applied = executor.apply("svcA", "2.0.0").await.unwrap();
    let expected = naming_from_config(&ImageNamingConfig::Applied).expected_image(
        "svcA",
        "2.0.0",
        &applied,
    );
    assert_eq!(expected, "registry/repo/svcA:2.0.0");

    // The new replica becomes ready a little after submission.
    let rolling = cluster.clone();
    let new_image = expected.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(12)).await;
        rolling.set_pods("svcA", vec![healthy_pod("svcA", "svcA-new", &new_image)]);
    });

    let (_tx, rx) = watch::channel(false);
    let converged = watcher.watch("svcA", &expected, rx).await.unwrap();

    assert_eq!(converged.pod, "svcA-new");
    assert_eq!(notifier.sent_for("svcA")[0].severity, Severity::Info);
}

#[tokio::test(start_paused = true)]
async fn registry_naming_mismatch_times_out() {
    let cluster = InMemoryCluster::new().with_workload("svcA", "other-registry/svcA:1");
    let notifier = Arc::new(RecordingNotifier::new());
    let executor = RolloutExecutor::new(Arc::new(cluster.clone()), notifier);
    let watcher = ConvergenceWatcher::new(
        Arc::new(cluster.clone()),
        WatchConfig {
            interval: Duration::from_secs(5),
            deadline: Duration::from_secs(20),
        },
    );

    let applied = executor.apply("svcA", "2").await.unwrap();
    cluster.set_pods("svcA", vec![healthy_pod("svcA", "svcA-1", &applied.new_image)]);

    let naming = naming_from_config(&ImageNamingConfig::Registry {
        registry: "registry.example.com".to_string(),
        repository: "uat".to_string(),
        strip_suffix: None,
    });
    let expected = naming.expected_image("svcA", "2", &applied);

    let (_tx, rx) = watch::channel(false);
    let err = watcher.watch("svcA", &expected, rx).await.unwrap_err();
    assert!(matches!(err, WatchError::TimedOut { .. }));
}
