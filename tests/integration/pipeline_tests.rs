//! Library-level tests of the split → enhance → export pipeline.
//!
//! Tests verify:
//! - Exact coverage and row-major order of real sliced images
//! - Enhancement state transitions, retries and single-flight behaviour
//! - Late results for replaced tile sets leaving the new set untouched
//! - Export choosing enhanced images over originals

use std::io::{Cursor, Read};
use std::sync::Arc;

use zip::ZipArchive;

use tilesmith::enhance::{
    Credential, CredentialStore, EnhancementOrchestrator, EnhancementOutcome, QualityLevel,
};
use tilesmith::{
    compute_geometry, BundleExporter, EnhanceError, ImageSlicer, TileRegistry, TileStatus,
    VendorError,
};

use super::test_utils::{
    decoded_dimensions, enhanced_png, gradient, jpeg_fixture, png_fixture, MockBehavior,
    MockEnhancementClient,
};

type Orchestrator = EnhancementOrchestrator<MockEnhancementClient, CredentialStore>;

async fn setup(
    client: MockEnhancementClient,
    credential: Option<&str>,
    rows: u32,
    cols: u32,
) -> (Arc<TileRegistry>, Orchestrator) {
    let registry = Arc::new(TileRegistry::new());
    let tiles = ImageSlicer::new()
        .slice(&png_fixture(300, 300), rows, cols)
        .unwrap();
    registry.replace_all(tiles).await;

    let orchestrator = EnhancementOrchestrator::new(
        Arc::clone(&registry),
        Arc::new(client),
        Arc::new(CredentialStore::from_secret(credential)),
    );
    (registry, orchestrator)
}

// =============================================================================
// Slicing
// =============================================================================

#[test]
fn test_scenario_a_even_split() {
    let tiles = ImageSlicer::new()
        .slice(&png_fixture(300, 300), 3, 3)
        .unwrap();

    assert_eq!(tiles.len(), 9);
    for tile in &tiles {
        assert_eq!(decoded_dimensions(tile.original_image()), (100, 100));
    }

    let tile = &tiles.tiles()[5];
    assert_eq!((tile.row(), tile.col()), (1, 2));
    assert_eq!((tile.rect().x, tile.rect().right()), (200, 300));
    assert_eq!((tile.rect().y, tile.rect().bottom()), (100, 200));
}

#[test]
fn test_tiles_carry_source_pixels() {
    let source = gradient(300, 300);
    let tiles = ImageSlicer::new()
        .slice(&png_fixture(300, 300), 3, 3)
        .unwrap();

    let tile = &tiles.tiles()[5];
    let decoded = image::load_from_memory(tile.original_image())
        .unwrap()
        .to_rgb8();
    assert_eq!(decoded.get_pixel(0, 0), source.get_pixel(200, 100));
    assert_eq!(decoded.get_pixel(99, 99), source.get_pixel(299, 199));
}

#[test]
fn test_coverage_and_order_for_uneven_grids() {
    let slicer = ImageSlicer::new();
    for (width, height, rows, cols) in [(10, 7, 3, 3), (101, 37, 4, 6), (64, 64, 1, 5)] {
        let tiles = slicer
            .slice(&png_fixture(width, height), rows, cols)
            .unwrap();
        assert_eq!(tiles.len(), (rows * cols) as usize);

        let mut area = 0u64;
        for (index, tile) in tiles.iter().enumerate() {
            let index = index as u32;
            assert_eq!((tile.row(), tile.col()), (index / cols, index % cols));

            let (w, h) = decoded_dimensions(tile.original_image());
            assert_eq!((w, h), (tile.rect().width, tile.rect().height));
            area += u64::from(w) * u64::from(h);
        }
        assert_eq!(area, u64::from(width) * u64::from(height));

        let geometry = compute_geometry(width, height, rows, cols).unwrap();
        let widths: Vec<u32> = geometry.iter().map(|r| r.width).collect();
        let spread = widths.iter().max().unwrap() - widths.iter().min().unwrap();
        assert!(spread <= 1, "{}x{} in {}x{}: {:?}", width, height, rows, cols, widths);
    }
}

#[test]
fn test_jpeg_source_yields_png_tiles() {
    let tiles = ImageSlicer::new()
        .slice(&jpeg_fixture(120, 80), 2, 2)
        .unwrap();
    for tile in &tiles {
        assert_eq!(
            image::guess_format(tile.original_image()).unwrap(),
            image::ImageFormat::Png
        );
    }
}

// =============================================================================
// Enhancement
// =============================================================================

#[tokio::test]
async fn test_scenario_b_missing_credential() {
    let client = MockEnhancementClient::succeeding(enhanced_png(200));
    let (registry, orchestrator) = setup(client.clone(), None, 2, 2).await;
    let id = registry.snapshot().await.tiles()[0].id().clone();

    let result = orchestrator
        .request_enhancement(&id, QualityLevel::High)
        .await;

    assert!(matches!(result, Err(EnhanceError::CredentialMissing)));
    assert_eq!(client.calls(), 0);
    assert_eq!(registry.get(&id).await.unwrap().status(), TileStatus::Idle);
}

#[tokio::test]
async fn test_scenario_c_success() {
    let result_image = enhanced_png(200);
    let client = MockEnhancementClient::succeeding(result_image.clone());
    let (registry, orchestrator) = setup(client.clone(), Some("key-1"), 2, 2).await;
    let id = registry.snapshot().await.tiles()[3].id().clone();

    let outcome = orchestrator
        .request_enhancement(&id, QualityLevel::Ultra)
        .await
        .unwrap();
    assert!(matches!(outcome, EnhancementOutcome::Enhanced(_)));

    let tile = registry.get(&id).await.unwrap();
    assert_eq!(tile.status(), TileStatus::Enhanced);
    assert_eq!(tile.enhanced_image(), Some(&result_image));
    assert_eq!(tile.requested_quality(), None);
    assert_eq!(tile.enhanced_quality(), Some(QualityLevel::Ultra));

    assert_eq!(client.qualities(), vec![QualityLevel::Ultra]);
    assert_eq!(client.credentials_seen(), vec!["key-1".to_string()]);

    // Other tiles are untouched
    let snapshot = registry.snapshot().await;
    assert_eq!(snapshot.tiles()[0].status(), TileStatus::Idle);
}

#[tokio::test]
async fn test_scenario_d_permission_denied_then_retry() {
    let client =
        MockEnhancementClient::failing(VendorError::with_status(403, "caller lacks permission"));
    let (registry, orchestrator) = setup(client.clone(), Some("key"), 2, 2).await;
    let id = registry.snapshot().await.tiles()[1].id().clone();

    let result = orchestrator
        .request_enhancement(&id, QualityLevel::Ultra)
        .await;
    assert!(matches!(result, Err(EnhanceError::PermissionDenied { .. })));

    let tile = registry.get(&id).await.unwrap();
    assert_eq!(tile.status(), TileStatus::Failed);
    assert!(tile.enhanced_image().is_none());
    assert!(tile.last_error().is_some());

    client.set_behavior(MockBehavior::Succeed(enhanced_png(10)));
    let outcome = orchestrator
        .request_enhancement(&id, QualityLevel::Standard)
        .await
        .unwrap();
    assert!(matches!(outcome, EnhancementOutcome::Enhanced(_)));
    assert_eq!(client.calls(), 2);

    let tile = registry.get(&id).await.unwrap();
    assert_eq!(tile.status(), TileStatus::Enhanced);
    assert!(tile.last_error().is_none());
}

#[tokio::test]
async fn test_generic_failure_is_service_error() {
    let client = MockEnhancementClient::failing(VendorError::new("connection reset"));
    let (registry, orchestrator) = setup(client, Some("key"), 1, 2).await;
    let id = registry.snapshot().await.tiles()[0].id().clone();

    let result = orchestrator
        .request_enhancement(&id, QualityLevel::Standard)
        .await;
    assert!(matches!(result, Err(EnhanceError::Service { .. })));
    assert_eq!(registry.get(&id).await.unwrap().status(), TileStatus::Failed);
}

#[tokio::test]
async fn test_enhanced_tile_is_not_sent_again() {
    let client = MockEnhancementClient::succeeding(enhanced_png(1));
    let (registry, orchestrator) = setup(client.clone(), Some("key"), 1, 1).await;
    let id = registry.snapshot().await.tiles()[0].id().clone();

    orchestrator
        .request_enhancement(&id, QualityLevel::Standard)
        .await
        .unwrap();
    let outcome = orchestrator
        .request_enhancement(&id, QualityLevel::Ultra)
        .await
        .unwrap();

    assert!(matches!(outcome, EnhancementOutcome::AlreadyEnhanced));
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn test_concurrent_requests_send_once() {
    let client = MockEnhancementClient::gated(enhanced_png(50));
    let (registry, orchestrator) = setup(client.clone(), Some("key"), 2, 2).await;
    let orchestrator = Arc::new(orchestrator);
    let id = registry.snapshot().await.tiles()[2].id().clone();

    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        let id = id.clone();
        tokio::spawn(async move {
            orchestrator
                .request_enhancement(&id, QualityLevel::High)
                .await
        })
    };
    client.started().await;

    assert_eq!(
        registry.get(&id).await.unwrap().status(),
        TileStatus::Enhancing
    );
    let second = orchestrator
        .request_enhancement(&id, QualityLevel::High)
        .await
        .unwrap();
    assert!(matches!(second, EnhancementOutcome::InFlight));

    client.release();
    let first = first.await.unwrap().unwrap();
    assert!(matches!(first, EnhancementOutcome::Enhanced(_)));

    assert_eq!(client.calls(), 1);
    assert_eq!(
        registry.get(&id).await.unwrap().status(),
        TileStatus::Enhanced
    );
}

#[tokio::test]
async fn test_result_for_replaced_set_is_discarded() {
    let client = MockEnhancementClient::gated(enhanced_png(50));
    let (registry, orchestrator) = setup(client.clone(), Some("key"), 2, 2).await;
    let orchestrator = Arc::new(orchestrator);
    let old_id = registry.snapshot().await.tiles()[0].id().clone();

    let pending = {
        let orchestrator = Arc::clone(&orchestrator);
        let id = old_id.clone();
        tokio::spawn(async move {
            orchestrator
                .request_enhancement(&id, QualityLevel::Standard)
                .await
        })
    };
    client.started().await;

    let replacement = ImageSlicer::new()
        .slice(&png_fixture(90, 90), 3, 3)
        .unwrap();
    registry.replace_all(replacement).await;

    client.release();
    let outcome = pending.await.unwrap().unwrap();
    assert!(matches!(outcome, EnhancementOutcome::Superseded));

    assert!(registry.get(&old_id).await.is_none());
    let snapshot = registry.snapshot().await;
    assert_eq!(snapshot.len(), 9);
    assert!(snapshot
        .iter()
        .all(|tile| tile.status() == TileStatus::Idle && tile.enhanced_image().is_none()));
}

// =============================================================================
// Export
// =============================================================================

fn archive_entries(data: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(Cursor::new(data)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut contents = Vec::new();
            file.read_to_end(&mut contents).unwrap();
            (file.name().to_string(), contents)
        })
        .collect()
}

#[tokio::test]
async fn test_scenario_e_export_mixed_set() {
    let client = MockEnhancementClient::succeeding(enhanced_png(0));
    let (registry, orchestrator) = setup(client.clone(), Some("key"), 2, 2).await;
    let snapshot = registry.snapshot().await;
    let ids: Vec<_> = snapshot.iter().map(|tile| tile.id().clone()).collect();

    let first = enhanced_png(11);
    let last = enhanced_png(44);
    client.set_behavior(MockBehavior::Succeed(first.clone()));
    orchestrator
        .request_enhancement(&ids[0], QualityLevel::Standard)
        .await
        .unwrap();
    client.set_behavior(MockBehavior::Succeed(last.clone()));
    orchestrator
        .request_enhancement(&ids[3], QualityLevel::Standard)
        .await
        .unwrap();

    let current = registry.snapshot().await;
    let archive = BundleExporter::new().export_all(&current).unwrap();
    let entries = archive_entries(&archive);

    let names: Vec<&str> = entries.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec!["tile_1_1.png", "tile_1_2.png", "tile_2_1.png", "tile_2_2.png"]
    );
    assert_eq!(entries[0].1, first.to_vec());
    assert_eq!(entries[1].1, snapshot.tiles()[1].original_image().to_vec());
    assert_eq!(entries[2].1, snapshot.tiles()[2].original_image().to_vec());
    assert_eq!(entries[3].1, last.to_vec());
}

#[tokio::test]
async fn test_export_single_follows_enhancement() {
    let result_image = enhanced_png(99);
    let client = MockEnhancementClient::succeeding(result_image.clone());
    let (registry, orchestrator) = setup(client, Some("key"), 1, 2).await;
    let id = registry.snapshot().await.tiles()[1].id().clone();
    let exporter = BundleExporter::new();

    let before = exporter.export_single(&registry.get(&id).await.unwrap());
    assert_eq!(before.filename, "tile-1-2.png");
    assert_eq!(decoded_dimensions(&before.data), (150, 300));

    orchestrator
        .request_enhancement(&id, QualityLevel::High)
        .await
        .unwrap();

    let after = exporter.export_single(&registry.get(&id).await.unwrap());
    assert_eq!(after.data, result_image);
}

#[tokio::test]
async fn test_export_empty_registry() {
    let registry = TileRegistry::new();
    let result = BundleExporter::new().export_all(&registry.snapshot().await);
    assert!(matches!(result, Err(tilesmith::ExportError::EmptySet)));
}

#[test]
fn test_credential_never_printed() {
    let credential = Credential::new("sk-live-123456").unwrap();
    assert!(!format!("{:?}", credential).contains("sk-live"));
}
