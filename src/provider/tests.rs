use std::sync::Arc;

use uuid::Uuid;

use super::audit::CapturingAuditSink;
use super::mock::MockProvider;
use super::{FaceProvider, ProviderError, validate_image};
use crate::constants::{EMBEDDING_DIM, MAX_IMAGE_BYTES};

fn test_image(tag: &str) -> Vec<u8> {
    let mut bytes = tag.as_bytes().to_vec();
    bytes.resize(256, 0);
    bytes
}

fn mock_with_sink() -> (MockProvider, Arc<CapturingAuditSink>) {
    let sink = Arc::new(CapturingAuditSink::new());
    (MockProvider::new(sink.clone()), sink)
}

#[test]
fn validate_image_rejects_empty() {
    let err = validate_image(&[]).unwrap_err();
    assert!(matches!(err, ProviderError::InvalidImage { .. }));
}

#[test]
fn validate_image_rejects_tiny() {
    let err = validate_image(&[0u8; 10]).unwrap_err();
    assert!(matches!(err, ProviderError::InvalidImage { .. }));
}

#[test]
fn validate_image_rejects_oversized() {
    let err = validate_image(&vec![0u8; MAX_IMAGE_BYTES + 1]).unwrap_err();
    assert!(matches!(err, ProviderError::InvalidImage { .. }));
}

#[test]
fn validate_image_accepts_bounds() {
    assert!(validate_image(&vec![0u8; 100]).is_ok());
    assert!(validate_image(&vec![0u8; MAX_IMAGE_BYTES]).is_ok());
}

#[tokio::test]
async fn analyze_returns_single_face_with_embedding() {
    let (provider, _) = mock_with_sink();

    let analysis = provider
        .analyze_face(&test_image("person-alice"))
        .await
        .expect("should analyze");

    assert_eq!(analysis.face_count, 1);
    let embedding = analysis.embedding.expect("embedding exposed");
    assert_eq!(embedding.len(), EMBEDDING_DIM);
    assert!(analysis.quality_score > 0.5);
}

#[tokio::test]
async fn analyze_reports_zero_faces_without_error() {
    let (provider, _) = mock_with_sink();

    let analysis = provider
        .analyze_face(&test_image("noface-wall"))
        .await
        .expect("zero faces is data, not an error");

    assert_eq!(analysis.face_count, 0);
    assert!(analysis.embedding.is_none());
}

#[tokio::test]
async fn analyze_reports_multiple_faces_without_error() {
    let (provider, _) = mock_with_sink();

    let analysis = provider
        .analyze_face(&test_image("twofaces-group"))
        .await
        .expect("multiple faces is data, not an error");

    assert_eq!(analysis.face_count, 2);
}

#[tokio::test]
async fn same_image_embeds_identically() {
    let (provider, _) = mock_with_sink();
    let image = test_image("person-bob");

    let a = provider.analyze_face(&image).await.unwrap().embedding.unwrap();
    let b = provider.analyze_face(&image).await.unwrap().embedding.unwrap();

    assert_eq!(a, b);
}

#[tokio::test]
async fn different_images_are_dissimilar() {
    let (provider, _) = mock_with_sink();

    let a = provider
        .analyze_face(&test_image("person-alice"))
        .await
        .unwrap()
        .embedding
        .unwrap();
    let b = provider
        .analyze_face(&test_image("person-bob"))
        .await
        .unwrap()
        .embedding
        .unwrap();

    let similarity = provider.compare_embeddings(&a, &b).await.unwrap();
    assert!(similarity < 0.5, "unexpectedly similar: {similarity}");
}

#[tokio::test]
async fn index_face_enrolls_into_collection() {
    let (provider, _) = mock_with_sink();
    let tenant = Uuid::new_v4();

    let indexed = provider
        .index_face(tenant, "alice", &test_image("person-alice"))
        .await
        .expect("should enroll");

    assert!(indexed.embedding.is_some());
    assert_eq!(provider.collection_size(tenant), Some(1));
}

#[tokio::test]
async fn index_face_rejects_no_face() {
    let (provider, _) = mock_with_sink();
    let tenant = Uuid::new_v4();

    let err = provider
        .index_face(tenant, "x", &test_image("noface-wall"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::NoFaceDetected));
}

#[tokio::test]
async fn index_face_rejects_multiple_faces() {
    let (provider, _) = mock_with_sink();
    let tenant = Uuid::new_v4();

    let err = provider
        .index_face(tenant, "x", &test_image("twofaces-group"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::MultipleFaces { count: 2 }));
}

#[tokio::test]
async fn index_face_rejects_low_quality() {
    let (provider, _) = mock_with_sink();
    let tenant = Uuid::new_v4();

    let err = provider
        .index_face(tenant, "x", &test_image("blurry-shot"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::QualityTooLow { .. }));
}

#[tokio::test]
async fn verify_indexed_matches_same_image() {
    let (provider, _) = mock_with_sink();
    let tenant = Uuid::new_v4();
    let image = test_image("person-carol");

    let indexed = provider.index_face(tenant, "carol", &image).await.unwrap();
    let similarity = provider
        .verify_indexed(tenant, &indexed.provider_face_id, &image, 0.8)
        .await
        .unwrap();

    assert!(similarity > 0.99, "got {similarity}");
}

#[tokio::test]
async fn verify_indexed_unknown_reference_fails() {
    let (provider, _) = mock_with_sink();

    let err = provider
        .verify_indexed(Uuid::new_v4(), "missing", &test_image("person-x"), 0.8)
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::FaceNotFound { .. }));
}

#[tokio::test]
async fn verify_indexed_is_tenant_scoped() {
    let (provider, _) = mock_with_sink();
    let tenant_a = Uuid::new_v4();
    let tenant_b = Uuid::new_v4();
    let image = test_image("person-dave");

    let indexed = provider.index_face(tenant_a, "dave", &image).await.unwrap();

    let err = provider
        .verify_indexed(tenant_b, &indexed.provider_face_id, &image, 0.8)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::FaceNotFound { .. }));
}

#[tokio::test]
async fn delete_face_removes_enrollment() {
    let (provider, _) = mock_with_sink();
    let tenant = Uuid::new_v4();

    let indexed = provider
        .index_face(tenant, "erin", &test_image("person-erin"))
        .await
        .unwrap();
    provider
        .delete_face(tenant, &indexed.provider_face_id)
        .await
        .unwrap();

    assert_eq!(provider.collection_size(tenant), Some(0));
}

#[tokio::test]
async fn collection_lifecycle_is_idempotent() {
    let (provider, _) = mock_with_sink();
    let tenant = Uuid::new_v4();

    provider.ensure_collection(tenant).await.unwrap();
    provider.ensure_collection(tenant).await.unwrap();
    assert_eq!(provider.collection_size(tenant), Some(0));

    provider.delete_collection(tenant).await.unwrap();
    provider.delete_collection(tenant).await.unwrap();
    assert_eq!(provider.collection_size(tenant), None);
}

#[tokio::test]
async fn liveness_passes_for_plain_image() {
    let (provider, _) = mock_with_sink();

    let result = provider
        .check_liveness(&test_image("person-frank"), 0.8)
        .await
        .unwrap();

    assert!(result.is_live);
    assert!(result.reasons.is_empty());
    assert!(result.checks.iter().all(|c| c.passed));
}

#[tokio::test]
async fn liveness_fails_for_spoof() {
    let (provider, _) = mock_with_sink();

    let result = provider
        .check_liveness(&test_image("spoof-screen"), 0.8)
        .await
        .unwrap();

    assert!(!result.is_live);
    assert!(!result.reasons.is_empty());
}

#[tokio::test]
async fn compare_face_images_same_vs_different() {
    let (provider, _) = mock_with_sink();
    let alice = test_image("person-alice");
    let bob = test_image("person-bob");

    let same = provider.compare_face_images(&alice, &alice, 0.8).await.unwrap();
    let diff = provider.compare_face_images(&alice, &bob, 0.8).await.unwrap();

    assert!(same > 0.99);
    assert!(diff < 0.5);
}

#[tokio::test]
async fn operations_emit_audit_events() {
    let (provider, sink) = mock_with_sink();
    let tenant = Uuid::new_v4();

    provider
        .analyze_face(&test_image("person-alice"))
        .await
        .unwrap();
    provider
        .index_face(tenant, "x", &test_image("noface-wall"))
        .await
        .unwrap_err();

    let events = sink.events();
    assert_eq!(events.len(), 2);

    assert_eq!(events[0].event_type, "analyze_face");
    assert!(events[0].success);
    assert_eq!(events[0].provider_name, "mock");

    assert_eq!(events[1].event_type, "index_face");
    assert!(!events[1].success);
    assert_eq!(events[1].tenant_id, Some(tenant));
    assert!(events[1].error.as_deref().unwrap().contains("no face"));
}
