use std::{cell::RefCell, collections::VecDeque, time::Duration};

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::{
    certificate::{CertificateSubject, SelfSignedCertificate},
    custom_resource::{dispatch, CustomResourceEvent},
    handlers::*,
    *,
};

type Reply = Result<Option<Deleted>, ProviderError>;

/// In-memory provider that replays scripted replies and records every call.
///
/// Once the script runs out every deletion succeeds.
#[derive(Default)]
struct FakeProvider {
    script: RefCell<VecDeque<Reply>>,
    calls: RefCell<Vec<TeardownRequest>>,
}

impl FakeProvider {
    fn scripted(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            script: RefCell::new(replies.into_iter().collect()),
            calls: Default::default(),
        }
    }

    fn calls(&self) -> Vec<TeardownRequest> {
        self.calls.borrow().clone()
    }
}

impl TeardownProvider for FakeProvider {
    async fn delete(&self, request: &TeardownRequest) -> Result<Option<Deleted>, ProviderError> {
        self.calls.borrow_mut().push(request.clone());
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(Some(Deleted::Identifier(request.identifier().to_owned()))))
    }
}

const CERT_ARN: &str = "arn:aws:acm:us-west-2:123456789012:certificate/0b5a6f1e";

fn busy() -> Reply {
    Err(ProviderError::new(
        Some("ResourceInUseException"),
        Some("Certificate is in use"),
        "ResourceInUseException: Certificate is in use",
    ))
}

fn deleted() -> Reply {
    Ok(Some(Deleted::Identifier(CERT_ARN.to_owned())))
}

fn fatal() -> Reply {
    Err(ProviderError::new(
        Some("AccessDeniedException"),
        Some("User is not authorized to perform acm:DeleteCertificate"),
        "AccessDeniedException: User is not authorized to perform acm:DeleteCertificate",
    ))
}

fn not_found(kind: ResourceKind) -> Reply {
    let (code, message) = match kind {
        ResourceKind::Bucket => ("NoSuchBucket", "The specified bucket does not exist"),
        ResourceKind::EcrRepository => (
            "RepositoryNotFoundException",
            "The repository with name 'repo' does not exist",
        ),
        ResourceKind::SageMakerModel => ("ValidationException", "Could not find model \"m\"."),
        ResourceKind::SageMakerEndpoint => {
            ("ValidationException", "Could not find endpoint \"m\".")
        }
        ResourceKind::SageMakerEndpointConfig => (
            "ValidationException",
            "Could not find endpoint configuration \"m\".",
        ),
        ResourceKind::AcmCertificate => (
            "ResourceNotFoundException",
            "Could not find certificate arn:aws:acm:c",
        ),
    };
    Err(ProviderError::new(Some(code), Some(message), format!("{code}: {message}")))
}

fn certificate_request() -> TeardownRequest {
    TeardownRequest::new(ResourceKind::AcmCertificate, CERT_ARN)
}

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_secs(30)).unwrap()
}

fn event(request_type: &str, properties: Value) -> CustomResourceEvent {
    CustomResourceEvent::from_value(json!({
        "RequestType": request_type,
        "RequestId": "5d478078-13e9-baf0-464a-7ef285ecc786",
        "StackId": "arn:aws:cloudformation:us-west-2:123456789012:stack/solution/guid",
        "LogicalResourceId": "Assistant",
        "ResourceType": "Custom::Assistant",
        "PhysicalResourceId": "solution-Assistant-abcdefgh",
        "ResourceProperties": properties,
    }))
    .unwrap()
}

#[tokio::test]
async fn deleting_a_missing_resource_succeeds() {
    let _ = env_logger::builder().is_test(true).try_init();

    for kind in ResourceKind::ALL {
        let provider = FakeProvider::scripted([not_found(kind)]);
        let executor = BoundedRetryExecutor::new(&provider);
        let request = TeardownRequest::new(kind, "gone");

        assert_eq!(
            TeardownOutcome::AlreadyAbsent,
            executor.teardown().attempt(&request).await,
            "{kind}"
        );

        let provider = FakeProvider::scripted([not_found(kind)]);
        let executor = BoundedRetryExecutor::new(&provider);
        let success = executor.run(&request, &policy(3)).await.unwrap();
        assert_eq!(
            Success {
                settled: Settled::AlreadyAbsent,
                attempts: 1
            },
            success,
            "{kind}"
        );
        assert_eq!(1, provider.calls().len());
    }
}

#[tokio::test(start_paused = true)]
async fn always_busy_exhausts_every_attempt() {
    let _ = env_logger::builder().is_test(true).try_init();

    for n in 1..=4u32 {
        let provider = FakeProvider::scripted((0..n).map(|_| busy()));
        let executor = BoundedRetryExecutor::new(&provider);
        let start = tokio::time::Instant::now();

        let error = executor
            .run(&certificate_request(), &policy(n))
            .await
            .unwrap_err();

        assert_eq!(n as usize, provider.calls().len());
        assert_eq!(Duration::from_secs(30) * (n - 1), start.elapsed());
        assert_eq!(&certificate_request(), error.request());
        match &error {
            TeardownError::BusyExhausted { attempts, .. } => {
                assert_eq!(n, *attempts);
            }
            other => panic!("expected busy exhaustion, got {other:?}"),
        }
        assert!(
            error.to_string().contains(&format!("after {n} attempts")),
            "{error}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn success_stops_retrying() {
    for k in 1..=3u32 {
        let replies = (1..k).map(|_| busy()).chain([deleted()]);
        let provider = FakeProvider::scripted(replies);
        let executor = BoundedRetryExecutor::new(&provider);
        let start = tokio::time::Instant::now();

        let success = executor
            .run(&certificate_request(), &policy(5))
            .await
            .unwrap();

        assert_eq!(k, success.attempts);
        assert_eq!(
            Settled::Deleted(Deleted::Identifier(CERT_ARN.to_owned())),
            success.settled
        );
        assert_eq!(k as usize, provider.calls().len());
        assert_eq!(Duration::from_secs(30) * (k - 1), start.elapsed());
    }
}

#[tokio::test(start_paused = true)]
async fn fatal_short_circuits() {
    let provider = FakeProvider::scripted([busy(), fatal(), deleted()]);
    let executor = BoundedRetryExecutor::new(&provider);
    let start = tokio::time::Instant::now();

    let error = executor
        .run(&certificate_request(), &policy(3))
        .await
        .unwrap_err();

    assert_eq!(2, provider.calls().len());
    assert_eq!(Duration::from_secs(30), start.elapsed());
    assert_eq!(&certificate_request(), error.request());
    match error {
        TeardownError::Fatal { source, .. } => {
            assert_eq!(fatal().unwrap_err(), source);
        }
        other => panic!("expected a fatal error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn fatal_on_first_attempt_never_sleeps() {
    let provider = FakeProvider::scripted([fatal()]);
    let executor = BoundedRetryExecutor::new(&provider);
    let start = tokio::time::Instant::now();

    let result = executor.run(&certificate_request(), &policy(3)).await;

    assert!(matches!(result, Err(TeardownError::Fatal { .. })));
    assert_eq!(1, provider.calls().len());
    assert_eq!(Duration::ZERO, start.elapsed());
}

#[tokio::test(start_paused = true)]
async fn certificate_scenarios() {
    let certificate = RetryPolicy::certificate();

    let provider = FakeProvider::scripted([busy(), busy(), deleted()]);
    let executor = BoundedRetryExecutor::new(&provider);
    let start = tokio::time::Instant::now();
    let success = executor
        .run(&certificate_request(), &certificate)
        .await
        .unwrap();
    assert_eq!(3, success.attempts);
    assert_eq!(Duration::from_secs(60), start.elapsed());

    let provider = FakeProvider::scripted([busy(), busy(), busy()]);
    let executor = BoundedRetryExecutor::new(&provider);
    let error = executor
        .run(&certificate_request(), &certificate)
        .await
        .unwrap_err();
    assert!(error.to_string().contains("after 3 attempts"), "{error}");
    assert_eq!(3, provider.calls().len());
}

#[tokio::test]
async fn single_attempt_policy_fails_on_busy() {
    let provider = FakeProvider::scripted([busy(), deleted()]);
    let executor = BoundedRetryExecutor::new(&provider);
    let result = executor
        .run(&certificate_request(), &RetryPolicy::once())
        .await;
    assert!(matches!(
        result,
        Err(TeardownError::BusyExhausted { attempts: 1, .. })
    ));
    assert_eq!(1, provider.calls().len());
}

#[tokio::test]
async fn repository_image_counts() {
    let request = TeardownRequest::new(ResourceKind::EcrRepository, "solution-images");

    let provider = FakeProvider::scripted([Ok(Some(Deleted::Count(5)))]);
    let teardown = ResourceTeardown::new(&provider);
    assert_eq!(
        TeardownOutcome::Deleted(Deleted::Count(5)),
        teardown.attempt(&request).await
    );

    let provider = FakeProvider::scripted([Ok(None)]);
    let teardown = ResourceTeardown::new(&provider);
    assert_eq!(TeardownOutcome::AlreadyAbsent, teardown.attempt(&request).await);
}

#[tokio::test]
async fn busy_carries_the_provider_message() {
    let provider = FakeProvider::scripted([busy()]);
    let teardown = ResourceTeardown::new(&provider);
    assert_eq!(
        TeardownOutcome::Busy("Certificate is in use".to_owned()),
        teardown.attempt(&certificate_request()).await
    );
}

#[tokio::test]
async fn solution_assistant_tears_down_in_order() {
    let _ = env_logger::builder().is_test(true).try_init();

    let provider = FakeProvider::scripted([
        Ok(Some(Deleted::Count(2))),
        not_found(ResourceKind::SageMakerModel),
    ]);
    let assistant = SolutionAssistant::new(Teardowns::new(&provider, Config::default()));
    let event = event(
        "Delete",
        json!({"ECRRepository": "solution-images", "SageMakerModel": "solution-model"}),
    );

    let response = dispatch(&assistant, &event).await.unwrap();

    assert_eq!(
        Some("solution-Assistant-abcdefgh".to_owned()),
        response.physical_resource_id
    );
    assert_eq!(
        vec![
            TeardownRequest::new(ResourceKind::EcrRepository, "solution-images"),
            TeardownRequest::new(ResourceKind::SageMakerModel, "solution-model"),
            TeardownRequest::new(ResourceKind::SageMakerEndpointConfig, "solution-model"),
            TeardownRequest::new(ResourceKind::SageMakerEndpoint, "solution-model"),
        ],
        provider.calls()
    );
}

#[tokio::test]
async fn solution_assistant_stops_on_fatal() {
    let provider = FakeProvider::scripted([Ok(None), fatal()]);
    let assistant = SolutionAssistant::new(Teardowns::new(&provider, Config::default()));
    let event = event(
        "Delete",
        json!({"ECRRepository": "solution-images", "SageMakerModel": "solution-model"}),
    );

    let result = dispatch(&assistant, &event).await;

    assert!(matches!(
        result,
        Err(Error::Teardown {
            source: TeardownError::Fatal { .. }
        })
    ));
    assert_eq!(2, provider.calls().len());
}

#[tokio::test]
async fn solution_assistant_ignores_create_and_update() {
    let provider = FakeProvider::default();
    let assistant = SolutionAssistant::new(Teardowns::new(&provider, Config::default()));
    for request_type in ["Create", "Update"] {
        dispatch(&assistant, &event(request_type, json!({}))).await.unwrap();
    }
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn bucket_assistant() {
    let provider = FakeProvider::scripted([Ok(Some(Deleted::Count(12)))]);
    let assistant = BucketAssistant::new(Teardowns::new(&provider, Config::default()));

    dispatch(&assistant, &event("Delete", json!({"S3Bucket": "solution-bucket"})))
        .await
        .unwrap();
    dispatch(&assistant, &event("Delete", json!({"S3Bucket": ""})))
        .await
        .unwrap();
    dispatch(&assistant, &event("Delete", json!({})))
        .await
        .unwrap();

    assert_eq!(
        vec![TeardownRequest::new(ResourceKind::Bucket, "solution-bucket")],
        provider.calls()
    );
}

#[tokio::test]
async fn bucket_assistant_missing_bucket_is_fine() {
    let provider = FakeProvider::scripted([not_found(ResourceKind::Bucket)]);
    let assistant = BucketAssistant::new(Teardowns::new(&provider, Config::default()));
    dispatch(&assistant, &event("Delete", json!({"S3Bucket": "gone"})))
        .await
        .unwrap();
}

#[tokio::test]
async fn string_functions() {
    let response = dispatch(
        &StringFunctions,
        &event("Create", json!({"Function": "random", "Length": "12"})),
    )
    .await
    .unwrap();
    let output = response.data["OutputString"].as_str().unwrap();
    assert_eq!(12, output.len());
    assert!(output
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));

    let response = dispatch(
        &StringFunctions,
        &event("Update", json!({"Function": "lower", "InputString": "Solution-STACK"})),
    )
    .await
    .unwrap();
    assert_eq!(json!("solution-stack"), response.data["OutputString"]);

    let response = dispatch(&StringFunctions, &event("Delete", json!({}))).await.unwrap();
    assert!(response.data.is_empty());
}

#[tokio::test]
async fn string_functions_errors() {
    let result = dispatch(
        &StringFunctions,
        &event("Create", json!({"Function": "upper", "InputString": "x"})),
    )
    .await;
    assert!(matches!(
        result,
        Err(Error::UnsupportedFunction { function }) if function == "upper"
    ));

    let result = dispatch(&StringFunctions, &event("Create", json!({"Function": "random"}))).await;
    assert!(matches!(
        result,
        Err(Error::MissingProperty { name }) if name == "Length"
    ));

    let result = dispatch(
        &StringFunctions,
        &event("Create", json!({"Function": "random", "Length": "-1"})),
    )
    .await;
    assert!(matches!(result, Err(Error::InvalidProperty { .. })));

    for length in ["4097", "18446744073709551615"] {
        let result = dispatch(
            &StringFunctions,
            &event("Create", json!({"Function": "random", "Length": length})),
        )
        .await;
        assert!(
            matches!(&result, Err(Error::InvalidProperty { name, .. }) if name == "Length"),
            "{length}: {result:?}"
        );
    }
}

#[tokio::test]
async fn longest_random_string() {
    let response = dispatch(
        &StringFunctions,
        &event("Create", json!({"Function": "random", "Length": 4096})),
    )
    .await
    .unwrap();
    assert_eq!(4096, response.data["OutputString"].as_str().unwrap().len());
}

#[derive(Default)]
struct FakeImporter {
    imported: RefCell<Vec<String>>,
}

impl CertificateImporter for FakeImporter {
    async fn import_certificate(
        &self,
        certificate: &SelfSignedCertificate,
    ) -> Result<String, ProviderError> {
        self.imported
            .borrow_mut()
            .push(certificate.fingerprint.clone());
        Ok(CERT_ARN.to_owned())
    }
}

#[tokio::test]
async fn certificate_issuer_imports_on_create_only() {
    let importer = FakeImporter::default();
    let issuer = CertificateIssuer::new(&importer);

    let response = dispatch(&issuer, &event("Create", json!({}))).await.unwrap();
    assert_eq!(Some(CERT_ARN.to_owned()), response.physical_resource_id);
    assert_eq!(json!(CERT_ARN), response.data["CertificateArn"]);
    assert_eq!(
        json!(importer.imported.borrow()[0]),
        response.data["Fingerprint"]
    );

    dispatch(&issuer, &event("Update", json!({}))).await.unwrap();
    dispatch(&issuer, &event("Delete", json!({}))).await.unwrap();
    assert_eq!(1, importer.imported.borrow().len());
}

#[tokio::test]
async fn certificate_issuer_imports_nothing_when_generation_fails() {
    let importer = FakeImporter::default();
    let issuer = CertificateIssuer::new(&importer).with_subject(CertificateSubject {
        dns_names: vec!["bücher.example".to_owned()],
        ..Default::default()
    });

    let result = dispatch(&issuer, &event("Create", json!({}))).await;

    assert!(
        matches!(result, Err(Error::CertificateGenerate { .. })),
        "{result:?}"
    );
    assert!(importer.imported.borrow().is_empty());
}

#[tokio::test(start_paused = true)]
async fn teardowns_pick_the_policy_for_each_kind() {
    let provider = FakeProvider::scripted([busy(), deleted(), busy()]);
    let teardowns = Teardowns::new(&provider, Config::default());

    let success = teardowns
        .tear_down(ResourceKind::AcmCertificate, CERT_ARN)
        .await
        .unwrap();
    assert_eq!(2, success.attempts);

    // busy is not a state a bucket can be in, so a single attempt is final
    let result = teardowns.tear_down(ResourceKind::Bucket, "b").await;
    assert!(matches!(
        result,
        Err(Error::Teardown {
            source: TeardownError::Fatal { .. }
        })
    ));
    assert_eq!(3, teardowns.provider().calls().len());
}

#[tokio::test(start_paused = true)]
async fn certificate_cleanup_waits_for_release() {
    let provider = FakeProvider::scripted([busy(), busy(), deleted()]);
    let cleanup = CertificateCleanup::new(Teardowns::new(&provider, Config::default()));
    let start = tokio::time::Instant::now();

    dispatch(&cleanup, &event("Delete", json!({"CertificateArn": CERT_ARN})))
        .await
        .unwrap();

    assert_eq!(3, provider.calls().len());
    assert_eq!(Duration::from_secs(60), start.elapsed());
}

#[tokio::test(start_paused = true)]
async fn certificate_cleanup_uses_configured_policy() {
    let provider = FakeProvider::scripted([busy(), busy(), busy()]);
    let config = Config::default().with_policy(
        ResourceKind::AcmCertificate,
        RetryPolicy::new(2, Duration::from_secs(5)).unwrap(),
    );
    let cleanup = CertificateCleanup::new(Teardowns::new(&provider, config));
    let start = tokio::time::Instant::now();

    let result = dispatch(&cleanup, &event("Delete", json!({"CertificateArn": CERT_ARN}))).await;

    assert!(matches!(
        result,
        Err(Error::Teardown {
            source: TeardownError::BusyExhausted { attempts: 2, .. }
        })
    ));
    assert_eq!(2, provider.calls().len());
    assert_eq!(Duration::from_secs(5), start.elapsed());
}

#[test]
fn resource_kind_names_round_trip() {
    for kind in ResourceKind::ALL {
        assert_eq!(kind, kind.as_str().parse::<ResourceKind>().unwrap());
        assert_eq!(
            Value::String(kind.as_str().to_owned()),
            serde_json::to_value(kind).unwrap()
        );
    }
    assert!(matches!(
        "dynamodb-table".parse::<ResourceKind>(),
        Err(Error::UnknownKind { .. })
    ));
}

#[test]
fn zero_attempts_is_not_a_policy() {
    assert!(matches!(
        RetryPolicy::new(0, Duration::from_secs(1)),
        Err(Error::InvalidPolicy { max_attempts: 0 })
    ));
}
