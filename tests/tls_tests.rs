mod common;

use barrage::{Attacker, Target};
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_default_attacker_trusts_self_signed() {
    let (addr, hits) = common::serve_self_signed("secure");

    let target = Target::get(&format!("https://{addr}/")).unwrap();
    let results = barrage::attack(&[target], 20.0, Duration::from_millis(500))
        .await
        .unwrap();

    assert_eq!(results.len(), 10);
    for result in &results {
        assert!(
            result.error.is_none(),
            "invalid certificates should be ignored: {result:?}"
        );
        assert_eq!(result.status_code, 200);
        assert_eq!(result.bytes_in, 6);
    }
    assert_eq!(hits.load(Ordering::SeqCst), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_verifying_attacker_rejects_self_signed() {
    let (addr, hits) = common::serve_self_signed("secure");

    let attacker = Attacker::builder().insecure(false).build().unwrap();
    let target = Target::get(&format!("https://{addr}/")).unwrap();
    let results = attacker
        .attack(&[target], 20.0, Duration::from_millis(500))
        .await
        .unwrap();

    assert_eq!(results.len(), 10);
    for result in &results {
        assert_eq!(result.status_code, 0);
        let error = result.error.as_deref().unwrap_or_default();
        assert!(error.contains("certificate"), "unexpected error: {error}");
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_trust_mode_does_not_affect_plain_http() {
    let (addr, hits) = common::counting_server("plain");

    let attacker = Attacker::builder().insecure(false).build().unwrap();
    let target = Target::get(&format!("http://{addr}/")).unwrap();
    let results = attacker
        .attack(&[target], 20.0, Duration::from_millis(500))
        .await
        .unwrap();

    assert!(results.iter().all(|r| r.status_code == 200));
    assert_eq!(hits.load(Ordering::SeqCst), 10);
}
