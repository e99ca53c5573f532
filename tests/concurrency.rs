use std::sync::Arc;

use autofill::{
    AutofillConfig, AutofillService, CredentialEntry, DeviceProfile, FieldDescriptor, FieldHint,
    FillRequest, MetricsCollector, PageContext, PageNode, StaticDeviceProvider,
};

fn entries() -> Vec<CredentialEntry> {
    (0..50)
        .map(|id| {
            CredentialEntry::new(id, format!("Site {id}"))
                .with_username(format!("user{id}"))
                .with_password("pw")
                .with_website(format!("site{id}.example.com"))
        })
        .collect()
}

fn request_for(site: u64) -> FillRequest {
    FillRequest::new("com.android.chrome")
        .with_page(PageContext::single(
            PageNode::new().with_domain(format!("www.site{site}.example.com")),
        ))
        .with_field(FieldDescriptor::new("user", FieldHint::Username))
        .with_field(FieldDescriptor::new("pass", FieldHint::Password))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shared_service_serves_parallel_requests() {
    let metrics = Arc::new(MetricsCollector::new());
    let service = Arc::new(
        AutofillService::new(
            &AutofillConfig::default(),
            &StaticDeviceProvider(DeviceProfile::stock(34)),
        )
        .expect("valid config")
        .with_metrics(Arc::clone(&metrics)),
    );
    let entries = Arc::new(entries());

    let tasks: Vec<_> = (0..8u64)
        .map(|worker| {
            let service = Arc::clone(&service);
            let entries = Arc::clone(&entries);
            tokio::spawn(async move {
                let mut best_ids = Vec::new();
                for i in 0..25u64 {
                    let site = (worker * 25 + i) % 50;
                    let outcome = service.handle(&request_for(site), &entries).await;
                    assert!(outcome.has_response());
                    best_ids.push((site, outcome.match_result.matches[0].entry.id));
                }
                best_ids
            })
        })
        .collect();

    for task in futures::future::join_all(tasks).await {
        for (site, best) in task.expect("worker panicked") {
            assert_eq!(site, best, "request for site {site} picked entry {best}");
        }
    }

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.total_requests, 200);
    assert_eq!(snapshot.successful_fills, 200);
    assert_eq!(snapshot.exact_matches, 200);
    assert_eq!(snapshot.response_times.len(), 200);
    assert_eq!(snapshot.source_apps["com.android.chrome"], 200);
    assert_eq!(snapshot.source_domains.len(), 50);
}

#[test]
fn collector_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<MetricsCollector>();
    assert_send_sync::<AutofillService>();
}
