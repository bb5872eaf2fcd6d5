//! Pipeline lifecycle integration tests.
//!
//! These tests drive the whole flow with mock clients:
//! - Intake posts the placeholder and publishes the job
//! - The worker generates, uploads and edits the placeholder in place
//! - Generation and upload failures end in the failure notice
//! - Generation is serialized while deliveries overlap
//! - A hung generation call stalls every later job

use std::sync::Arc;
use std::time::Duration;

use diffusion_core::{
    generation::GenerationError,
    intake::{IntakeOutcome, IntakeService, JobReceipt},
    job::{object_key, CorrelationId},
    registry::ClientRegistry,
    status::GENERIC_FAILURE_NOTICE,
    storage::StorageError,
    testing::{
        fixtures, MockChatClient, MockCredentialStore, MockImageGenerator, MockObjectStore,
        MockQueue, RecordedEdit,
    },
    worker::{PipelineWorker, WorkerSettings},
    MessageBlock, ObjectStore,
};

/// Intake and worker sharing one set of mock clients.
struct TestHarness {
    intake: IntakeService,
    worker: PipelineWorker,
    queue: Arc<MockQueue>,
    chat: Arc<MockChatClient>,
    storage: Arc<MockObjectStore>,
    generator: Arc<MockImageGenerator>,
}

impl TestHarness {
    fn new() -> Self {
        let queue = Arc::new(MockQueue::new());
        let chat = Arc::new(MockChatClient::new());
        let storage = Arc::new(MockObjectStore::new());
        let generator = Arc::new(MockImageGenerator::new());
        let credentials = Arc::new(MockCredentialStore::with_user(
            fixtures::REQUESTER_ID,
            "xoxp-42",
        ));

        let (registry, _fatal) =
            ClientRegistry::with_clients(queue.clone(), storage.clone(), chat.clone());
        let intake = IntakeService::new(
            registry.clone(),
            credentials.clone(),
            &fixtures::chat_config(),
        );
        let worker = PipelineWorker::new(
            WorkerSettings::default(),
            registry,
            credentials,
            generator.clone(),
        );

        Self {
            intake,
            worker,
            queue,
            chat,
            storage,
            generator,
        }
    }

    async fn submit(&self, text: &str) -> JobReceipt {
        match self
            .intake
            .submit(&fixtures::command_request(text))
            .await
            .expect("submit failed")
        {
            IntakeOutcome::Queued(receipt) => receipt,
            other => panic!("job not queued: {:?}", other),
        }
    }

    async fn edits(&self, receipt: &JobReceipt) -> Vec<RecordedEdit> {
        self.chat.edits_of(&receipt.message_ref).await
    }

    /// Wait until the placeholder of `receipt` has `count` applied edits.
    async fn wait_for_edits(&self, receipt: &JobReceipt, count: usize) -> Vec<RecordedEdit> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let edits = self.edits(receipt).await;
                if edits.len() >= count {
                    return edits;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("edits not reached")
    }
}

fn markdown(text: &str) -> Vec<MessageBlock> {
    vec![MessageBlock::markdown(text)]
}

fn image_urls(blocks: &[MessageBlock]) -> Vec<String> {
    blocks
        .iter()
        .filter_map(|block| match block {
            MessageBlock::Image { url, .. } => Some(url.clone()),
            _ => None,
        })
        .collect()
}

fn expected_url(storage: &MockObjectStore, id: &CorrelationId, index: usize) -> String {
    storage.public_url(&object_key(id, index))
}

#[tokio::test]
async fn test_two_images_delivered_in_place() {
    let h = TestHarness::new();
    h.worker.start();

    let receipt = h.submit("x2 a red fox").await;
    assert_eq!(receipt.image_count, 2);
    assert_eq!(h.queue.published().await.len(), 1);

    let posts = h.chat.recorded_posts().await;
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].blocks, vec![MessageBlock::plain("/diffusion x2 a red fox")]);
    assert_eq!(posts[1].message_ref, receipt.message_ref);
    assert_eq!(posts[1].blocks, markdown("_Queueing..._"));
    assert_eq!(posts[1].token, "xoxp-42");

    let edits = h.wait_for_edits(&receipt, 3).await;
    assert_eq!(edits[0].blocks, markdown("_Generating..._"));
    assert_eq!(edits[1].blocks, markdown("_Loading..._"));
    assert_eq!(
        image_urls(&edits[2].blocks),
        vec![
            expected_url(&h.storage, &receipt.correlation_id, 0),
            expected_url(&h.storage, &receipt.correlation_id, 1),
        ]
    );

    let requests = h.generator.recorded_requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].prompt, "a red fox");
    assert_eq!(requests[0].image_count, 2);

    assert_eq!(
        h.storage.recorded_puts().await,
        vec![
            object_key(&receipt.correlation_id, 0),
            object_key(&receipt.correlation_id, 1),
        ]
    );
    let metadata = h
        .storage
        .metadata(&object_key(&receipt.correlation_id, 1))
        .await
        .unwrap();
    assert_eq!(metadata["prompt"], "a red fox");
    assert_eq!(metadata["userId"], fixtures::REQUESTER_ID);

    h.worker.stop();
}

#[tokio::test]
async fn test_generation_failure_ends_in_notice() {
    let h = TestHarness::new();
    h.generator
        .set_next_error(GenerationError::backend(500, "engine overloaded"))
        .await;
    h.worker.start();

    let receipt = h.submit("a red fox").await;
    let edits = h.wait_for_edits(&receipt, 2).await;
    assert_eq!(edits[0].blocks, markdown("_Generating..._"));
    assert_eq!(edits[1].blocks, markdown(GENERIC_FAILURE_NOTICE));

    // Give a stray delivery the chance to show up.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.storage.recorded_puts().await.is_empty());
    assert_eq!(h.edits(&receipt).await.len(), 2);

    let status = h.worker.status().await;
    assert_eq!(status.jobs_failed, 1);
    h.worker.stop();
}

#[tokio::test]
async fn test_upload_failure_keeps_earlier_objects() {
    let h = TestHarness::new();
    h.worker.start();

    // The key is only known once intake runs; generation latency keeps the
    // upload behind the injection.
    h.generator.set_latency(Duration::from_millis(100)).await;
    let receipt = h.submit("x3 a red fox").await;
    h.storage
        .fail_put(
            &object_key(&receipt.correlation_id, 1),
            StorageError::Http("connection reset".into()),
        )
        .await;

    let edits = h.wait_for_edits(&receipt, 3).await;
    assert_eq!(edits[1].blocks, markdown("_Loading..._"));
    assert_eq!(edits[2].blocks, markdown(GENERIC_FAILURE_NOTICE));

    assert!(h.storage.contains(&object_key(&receipt.correlation_id, 0)).await);
    assert!(!h.storage.contains(&object_key(&receipt.correlation_id, 1)).await);
    assert!(!h.storage.contains(&object_key(&receipt.correlation_id, 2)).await);
    h.worker.stop();
}

#[tokio::test]
async fn test_generation_is_serialized_while_deliveries_overlap() {
    let h = TestHarness::new();
    h.generator.set_latency(Duration::from_millis(100)).await;
    h.storage.set_latency(Duration::from_millis(150)).await;
    h.worker.start();

    let mut receipts = Vec::new();
    for prompt in ["a red fox", "a blue whale", "a green owl"] {
        receipts.push(h.submit(prompt).await);
    }
    for receipt in &receipts {
        let edits = h.wait_for_edits(receipt, 3).await;
        assert_eq!(image_urls(&edits[2].blocks).len(), 1);
    }

    let generations = h.generator.recorded_generations().await;
    assert_eq!(generations.len(), 3);
    assert_eq!(h.generator.max_concurrency(), 1);
    for pair in generations.windows(2) {
        assert!(pair[0].finished <= pair[1].started);
    }
    assert!(h.storage.max_concurrency() >= 2);

    let status = h.worker.status().await;
    assert_eq!(status.jobs_generated, 3);
    h.worker.stop();
}

#[tokio::test]
async fn test_hung_generation_stalls_later_jobs() {
    let h = TestHarness::new();
    h.generator.hold();
    h.worker.start();

    let first = h.submit("a red fox").await;
    let second = h.submit("a blue whale").await;
    h.wait_for_edits(&first, 1).await;

    // No timeout: while the first call hangs the second job stays queued.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.generator.in_flight(), 1);
    assert_eq!(h.edits(&first).await.len(), 1);
    assert!(h.edits(&second).await.is_empty());
    assert_eq!(h.worker.status().await.jobs_generated, 0);

    h.generator.release();
    let edits = h.wait_for_edits(&second, 3).await;
    assert_eq!(edits[0].blocks, markdown("_Generating..._"));
    assert_eq!(image_urls(&edits[2].blocks).len(), 1);
    assert_eq!(h.wait_for_edits(&first, 3).await.len(), 3);
    assert_eq!(h.generator.max_concurrency(), 1);
    h.worker.stop();
}

#[tokio::test]
async fn test_unauthorized_requester_queues_nothing() {
    let h = TestHarness::new();
    let mut request = fixtures::command_request("a red fox");
    request.requester_id = "U_STRANGER".to_string();

    let outcome = h.intake.submit(&request).await.unwrap();
    assert!(matches!(outcome, IntakeOutcome::NotAuthorized { .. }));
    assert!(h.queue.published().await.is_empty());
    assert!(h.chat.recorded_posts().await.is_empty());
}
