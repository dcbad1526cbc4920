mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

use afrozon_backend::models::activity::ActivityKind;
use afrozon_backend::models::auth::Actor;
use afrozon_backend::models::vehicle::{
    ApiSyncStatus, Pagination, SortKey, SortOrder, VehicleFilters, VehicleId, VehicleSource,
};
use afrozon_backend::repositories::VehicleStore;
use afrozon_backend::services::IdentifierKind;
use afrozon_backend::utils::errors::AppError;

use common::{listing, synced_vehicle, test_config, FixedRate, TestApp, VIN_A, VIN_B, VIN_C};

#[tokio::test]
async fn test_list_merges_external_listings_without_duplicate_vins() {
    let app = TestApp::new();
    let persisted = listing(VIN_A, "Toyota", "Camry", dec!(18000));
    app.vehicles.seed(synced_vehicle(&persisted, Utc::now())).await;

    app.provider.publish(persisted.clone());
    app.provider.publish(listing(VIN_B, "Honda", "Accord", dec!(21000)));
    app.provider.publish(listing(VIN_C, "Tesla", "Model 3", dec!(32000)));

    let result = app
        .state
        .resolution
        .resolve_list(&VehicleFilters::default(), Pagination::default(), true)
        .await
        .unwrap();

    let vins: Vec<&str> = result.items.iter().map(|v| v.vin.as_str()).collect();
    assert_eq!(vins.iter().filter(|v| **v == VIN_A).count(), 1);
    assert_eq!(result.items.len(), 3);
    assert_eq!(result.external_count, 2);
    assert_eq!(result.total, 3);

    let persisted_item = result.items.iter().find(|v| v.vin == VIN_A).unwrap();
    assert!(!persisted_item.is_temporary);
    let ephemeral = result.items.iter().find(|v| v.vin == VIN_B).unwrap();
    assert!(ephemeral.is_temporary);
    assert_eq!(ephemeral.id, VehicleId::Temporary(VIN_B.to_string()));

    // Existencia de VINs resuelta en una sola consulta
    assert_eq!(app.vehicles.existence_queries(), 1);
}

#[tokio::test]
async fn test_listing_persisted_outside_current_page_is_not_duplicated() {
    let app = TestApp::new();
    // VIN_B existe en el store pero no coincide con el filtro de la página
    let mut hidden = synced_vehicle(&listing(VIN_B, "Honda", "Accord", dec!(21000)), Utc::now());
    hidden.region = Some("CA".to_string());
    app.vehicles.seed(hidden).await;

    let mut external = listing(VIN_B, "Honda", "Accord", dec!(21000));
    external.region = Some("TX".to_string());
    app.provider.publish(external);

    let filters = VehicleFilters {
        region: Some("TX".to_string()),
        ..Default::default()
    };
    let result = app
        .state
        .resolution
        .resolve_list(&filters, Pagination::default(), true)
        .await
        .unwrap();

    assert!(result.items.is_empty());
    assert_eq!(result.external_count, 0);
}

#[tokio::test]
async fn test_external_listings_are_cached_between_requests() {
    let app = TestApp::new();
    app.provider.publish(listing(VIN_B, "Honda", "Accord", dec!(21000)));

    for _ in 0..3 {
        app.state
            .resolution
            .resolve_list(&VehicleFilters::default(), Pagination::default(), true)
            .await
            .unwrap();
    }
    assert_eq!(app.provider.list_calls(), 1);

    // Purga explícita: la siguiente página vuelve al proveedor
    assert!(app.state.resolution.purge_external_cache().await >= 1);
    app.state
        .resolution
        .resolve_list(&VehicleFilters::default(), Pagination::default(), true)
        .await
        .unwrap();
    assert_eq!(app.provider.list_calls(), 2);
}

#[tokio::test]
async fn test_provider_outage_degrades_to_local_inventory() {
    let app = TestApp::new();
    app.vehicles
        .seed(synced_vehicle(&listing(VIN_A, "Toyota", "Camry", dec!(18000)), Utc::now()))
        .await;
    app.provider.set_failing(true);

    let result = app
        .state
        .resolution
        .resolve_list(&VehicleFilters::default(), Pagination::default(), true)
        .await
        .unwrap();

    assert_eq!(result.items.len(), 1);
    assert_eq!(result.external_count, 0);
}

#[tokio::test]
async fn test_listings_without_price_are_skipped() {
    let app = TestApp::new();
    app.provider.publish(listing(VIN_B, "Honda", "Accord", dec!(0)));
    app.provider.publish(listing(VIN_C, "Tesla", "Model 3", dec!(32000)));

    let result = app
        .state
        .resolution
        .resolve_list(&VehicleFilters::default(), Pagination::default(), true)
        .await
        .unwrap();

    let vins: Vec<&str> = result.items.iter().map(|v| v.vin.as_str()).collect();
    assert_eq!(vins, vec![VIN_C]);
}

#[tokio::test]
async fn test_temp_id_resolves_through_provider() {
    let app = TestApp::new();
    app.provider.publish(listing(VIN_B, "Honda", "Accord", dec!(21000)));

    let vehicle = app
        .state
        .resolution
        .resolve_one(&format!("temp-{}", VIN_B.to_lowercase()), IdentifierKind::Id)
        .await
        .unwrap();

    assert!(vehicle.is_temporary);
    assert_eq!(vehicle.vin, VIN_B);
    assert_eq!(vehicle.photos.len(), 1);
    assert!(vehicle.specifications.is_some());
    assert_eq!(app.vehicles.count().await, 0);

    let missing = app
        .state
        .resolution
        .resolve_one(VIN_C, IdentifierKind::Vin)
        .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_promotion_is_idempotent_per_vin() {
    let app = TestApp::new();
    let external = listing(VIN_B, "Honda", "Accord", dec!(21000));

    let first = app.state.resolution.promote(&external, None, None).await.unwrap();
    let second = app.state.resolution.promote(&external, None, None).await.unwrap();

    assert_eq!(first.persisted_id(), second.persisted_id());
    assert_eq!(app.vehicles.count().await, 1);
    assert_eq!(first.source, VehicleSource::Api);
    assert_eq!(first.api_sync_status, ApiSyncStatus::Synced);

    let promoted = app
        .activity
        .records()
        .await
        .into_iter()
        .filter(|r| r.kind == ActivityKind::VehiclePromoted)
        .count();
    assert_eq!(promoted, 1);
}

#[tokio::test]
async fn test_promotion_of_known_vin_records_price_change() {
    let app = TestApp::new();
    let external = listing(VIN_B, "Honda", "Accord", dec!(21000));
    app.state.resolution.promote(&external, None, None).await.unwrap();

    let mut cheaper = external.clone();
    cheaper.price_usd = Some(dec!(19500));
    let vehicle = app.state.resolution.promote(&cheaper, None, None).await.unwrap();

    assert_eq!(vehicle.price_usd, dec!(19500));
    assert_eq!(vehicle.price_history.len(), 1);
    assert_eq!(vehicle.price_history[0].previous_price, dec!(21000));
    assert_eq!(app.vehicles.count().await, 1);
}

#[tokio::test]
async fn test_stale_vehicle_detail_refreshes_price() {
    let app = TestApp::new();
    let stale_at = Utc::now() - Duration::hours(13);
    let external = listing(VIN_A, "Toyota", "Camry", dec!(20000));
    let id = app.vehicles.seed(synced_vehicle(&external, stale_at)).await;

    app.provider.publish(external);
    app.provider.set_price(VIN_A, dec!(19000));

    let vehicle = app
        .state
        .resolution
        .resolve_one(&id.to_string(), IdentifierKind::Id)
        .await
        .unwrap();

    assert_eq!(vehicle.price_usd, dec!(19000));
    assert_eq!(vehicle.api_sync_status, ApiSyncStatus::Synced);
    assert_eq!(vehicle.price_history.len(), 1);
    let entry = &vehicle.price_history[0];
    assert_eq!(entry.previous_price, dec!(20000));
    assert_eq!(entry.change_amount, dec!(-1000));
    assert_eq!(entry.change_percent, dec!(-5.00));
    assert_eq!(entry.reason, "api_sync");

    let logged = app.activity.records().await;
    assert!(logged.iter().any(|r| r.kind == ActivityKind::PriceChanged));
}

#[tokio::test]
async fn test_unchanged_price_only_advances_sync_time() {
    let app = TestApp::new();
    let stale_at = Utc::now() - Duration::hours(13);
    let external = listing(VIN_A, "Toyota", "Camry", dec!(20000));
    let id = app.vehicles.seed(synced_vehicle(&external, stale_at)).await;
    app.provider.publish(external);

    let vehicle = app
        .state
        .resolution
        .resolve_one(&id.to_string(), IdentifierKind::Id)
        .await
        .unwrap();

    assert!(vehicle.price_history.is_empty());
    assert!(vehicle.last_api_sync.unwrap() > stale_at);
    let stored = app.vehicles.find_by_id(id).await.unwrap().unwrap();
    assert!(stored.last_api_sync.unwrap() > stale_at);
}

#[tokio::test]
async fn test_failed_refresh_keeps_last_price_and_marks_outdated() {
    let app = TestApp::new();
    let stale_at = Utc::now() - Duration::hours(13);
    let external = listing(VIN_A, "Toyota", "Camry", dec!(20000));
    let id = app.vehicles.seed(synced_vehicle(&external, stale_at)).await;
    app.provider.set_failing(true);

    let vehicle = app
        .state
        .resolution
        .resolve_one(&id.to_string(), IdentifierKind::Id)
        .await
        .unwrap();

    assert_eq!(vehicle.price_usd, dec!(20000));
    assert_eq!(vehicle.api_sync_status, ApiSyncStatus::Outdated);
    let stored = app.vehicles.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.api_sync_status, ApiSyncStatus::Outdated);
    assert_eq!(stored.last_api_sync, Some(stale_at));

    let logged = app.activity.records().await;
    assert!(logged.iter().any(|r| r.kind == ActivityKind::RefreshFailed));
}

#[tokio::test]
async fn test_fresh_and_manual_vehicles_skip_the_provider() {
    let app = TestApp::new();
    let fresh = app
        .vehicles
        .seed(synced_vehicle(&listing(VIN_A, "Toyota", "Camry", dec!(20000)), Utc::now()))
        .await;

    let mut manual = synced_vehicle(
        &listing(VIN_B, "Honda", "Accord", dec!(21000)),
        Utc::now() - Duration::days(60),
    );
    manual.source = VehicleSource::Manual;
    let manual = app.vehicles.seed(manual).await;

    for id in [fresh, manual] {
        app.state
            .resolution
            .resolve_one(&id.to_string(), IdentifierKind::Id)
            .await
            .unwrap();
    }
    assert_eq!(app.provider.vin_calls(), 0);
}

#[tokio::test]
async fn test_deleted_vin_is_not_offered_as_temporary() {
    let app = TestApp::new();
    let external = listing(VIN_A, "Toyota", "Camry", dec!(20000));
    let id = app.vehicles.seed(synced_vehicle(&external, Utc::now())).await;
    app.state
        .inventory
        .delete_vehicle(id, &Actor::admin(Uuid::new_v4()))
        .await
        .unwrap();
    app.provider.publish(external);

    let result = app
        .state
        .resolution
        .resolve_list(&VehicleFilters::default(), Pagination::default(), true)
        .await
        .unwrap();
    assert!(result.items.is_empty());

    for (identifier, kind) in [
        (format!("temp-{}", VIN_A), IdentifierKind::Id),
        (VIN_A.to_string(), IdentifierKind::Vin),
    ] {
        let lookup = app.state.resolution.resolve_one(&identifier, kind).await;
        assert!(matches!(lookup, Err(AppError::NotFound(_))), "{}", identifier);
    }
    assert_eq!(app.provider.vin_calls(), 0);
}

#[tokio::test]
async fn test_explicit_sort_orders_the_combined_page() {
    let app = TestApp::new();
    app.vehicles
        .seed(synced_vehicle(&listing(VIN_A, "Toyota", "Land Cruiser", dec!(25000)), Utc::now()))
        .await;
    app.provider.publish(listing(VIN_B, "Honda", "Accord", dec!(21000)));
    app.provider.publish(listing(VIN_C, "Tesla", "Model 3", dec!(32000)));

    for (order, expected) in [
        (SortOrder::Asc, [VIN_B, VIN_A, VIN_C]),
        (SortOrder::Desc, [VIN_C, VIN_A, VIN_B]),
    ] {
        let filters = VehicleFilters {
            sort_by: Some(SortKey::Price),
            sort_order: order,
            ..Default::default()
        };
        let result = app
            .state
            .resolution
            .resolve_list(&filters, Pagination::default(), true)
            .await
            .unwrap();
        let vins: Vec<&str> = result.items.iter().map(|v| v.vin.as_str()).collect();
        assert_eq!(vins, expected, "{:?}", order);
    }
}

#[tokio::test]
async fn test_noise_makes_demoted_only_when_browsing_unfiltered() {
    let mut config = test_config();
    config.noise_makes = vec!["Freightliner".to_string()];
    let app = TestApp::with_config(config, Arc::new(FixedRate(dec!(1500))));

    app.vehicles
        .seed(synced_vehicle(&listing(VIN_A, "Freightliner", "Cascadia", dec!(90000)), Utc::now()))
        .await;
    app.provider.publish(listing(VIN_B, "Honda", "Accord", dec!(21000)));
    app.provider.publish(listing(VIN_C, "Tesla", "Model 3", dec!(32000)));

    let unfiltered = app
        .state
        .resolution
        .resolve_list(&VehicleFilters::default(), Pagination::default(), true)
        .await
        .unwrap();
    let vins: Vec<&str> = unfiltered.items.iter().map(|v| v.vin.as_str()).collect();
    assert_eq!(vins, vec![VIN_B, VIN_C, VIN_A]);

    let by_body = VehicleFilters {
        body_type: Some("Sedan".to_string()),
        ..Default::default()
    };
    let scoped = app
        .state
        .resolution
        .resolve_list(&by_body, Pagination::default(), true)
        .await
        .unwrap();
    assert_eq!(scoped.items.len(), 3);
    assert_eq!(scoped.items[0].vin, VIN_A);
}

#[tokio::test]
async fn test_list_refreshes_stale_rows_without_waiting() {
    let app = TestApp::new();
    let stale_at = Utc::now() - Duration::hours(13);
    let external = listing(VIN_A, "Toyota", "Camry", dec!(20000));
    let id = app.vehicles.seed(synced_vehicle(&external, stale_at)).await;
    app.provider.publish(external);
    app.provider.set_price(VIN_A, dec!(19000));

    // Con el proveedor retenido, la página debe volver igual
    let held = app.provider.hold_vin_lookups().await;
    let result = tokio::time::timeout(
        StdDuration::from_secs(2),
        app.state
            .resolution
            .resolve_list(&VehicleFilters::default(), Pagination::default(), false),
    )
    .await
    .expect("listing waited on the refresh")
    .unwrap();
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].price_usd, dec!(20000));
    drop(held);

    let mut stored = app.vehicles.find_by_id(id).await.unwrap().unwrap();
    for _ in 0..200 {
        if stored.price_usd == dec!(19000) {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        stored = app.vehicles.find_by_id(id).await.unwrap().unwrap();
    }
    assert_eq!(stored.price_usd, dec!(19000));
    assert_eq!(stored.price_history.len(), 1);
    assert_eq!(app.provider.vin_calls(), 1);
}

#[tokio::test]
async fn test_price_history_grows_only_on_real_changes() {
    let app = TestApp::new();
    let stale_at = Utc::now() - Duration::hours(13);
    let external = listing(VIN_A, "Toyota", "Camry", dec!(20000));
    let id = app.vehicles.seed(synced_vehicle(&external, stale_at)).await;
    app.provider.publish(external);

    let refresher = app.state.resolution.refresher();
    let mut current = app.vehicles.find_by_id(id).await.unwrap().unwrap();
    for price in [dec!(19000), dec!(19000), dec!(18500), dec!(18500), dec!(19200)] {
        app.provider.set_price(VIN_A, price);
        current = refresher.refresh(&current).await.into_vehicle();
    }

    let stored = app.vehicles.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.price_usd, dec!(19200));
    let changes: Vec<_> = stored
        .price_history
        .iter()
        .map(|e| (e.previous_price, e.price))
        .collect();
    assert_eq!(
        changes,
        vec![
            (dec!(20000), dec!(19000)),
            (dec!(19000), dec!(18500)),
            (dec!(18500), dec!(19200)),
        ]
    );
    assert!(stored
        .price_history
        .windows(2)
        .all(|w| w[0].recorded_at <= w[1].recorded_at));
    assert_eq!(app.provider.vin_calls(), 5);
}

#[tokio::test]
async fn test_detail_view_waits_for_refresh_already_running() {
    let app = TestApp::new();
    let stale_at = Utc::now() - Duration::hours(13);
    let external = listing(VIN_A, "Toyota", "Camry", dec!(20000));
    let id = app.vehicles.seed(synced_vehicle(&external, stale_at)).await;
    app.provider.publish(external);
    app.provider.set_price(VIN_A, dec!(19000));

    let held = app.provider.hold_vin_lookups().await;
    let stale = app.vehicles.find_by_id(id).await.unwrap().unwrap();
    let background = app.state.resolution.refresher().spawn_refresh(stale);
    while app.provider.vin_calls() == 0 {
        tokio::task::yield_now().await;
    }

    let engine = app.state.resolution.clone();
    let detail = tokio::spawn(async move {
        engine.resolve_one(&id.to_string(), IdentifierKind::Id).await
    });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    drop(held);

    background.await.unwrap();
    let vehicle = detail.await.unwrap().unwrap();
    assert_eq!(vehicle.price_usd, dec!(19000));
    assert_eq!(vehicle.price_history.len(), 1);
    // Un solo viaje al proveedor para ambos
    assert_eq!(app.provider.vin_calls(), 1);
}
