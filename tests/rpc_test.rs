//! RPC gateway behavior: wrapper defaults, parameter mapping, and the price
//! change validation contract.

use chrono::NaiveDate;
use dropship_sdk::{ApiError, Client, MemoryBackend, RpcDefaults};
use serde_json::{json, Value};

fn param(params: &[(&'static str, Value)], name: &str) -> Value {
    params
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v.clone())
        .unwrap_or_else(|| panic!("missing param {name}"))
}

/// Mirrors the deployed `validate_price_change` function: listing 42 sells at
/// 100.00, changes strictly above the threshold are rejected.
fn price_change_backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.register_procedure(
        "validate_price_change",
        Box::new(|params| {
            let listing_id = param(params, "p_listing_id");
            if listing_id != json!(42) {
                return Err(ApiError::procedure(
                    "validate_price_change",
                    "listing not found",
                ));
            }
            let current = 100.0;
            let new_price = param(params, "p_new_price").as_f64().unwrap();
            let max = param(params, "p_max_change_percent").as_f64().unwrap();
            let change_percent = ((new_price - current).abs() / current) * 100.0;
            Ok(json!({
                "allowed": change_percent <= max,
                "change_percent": change_percent,
            }))
        }),
    );
    backend
}

#[tokio::test]
async fn top_products_wrapper_applies_defaults() {
    let backend = MemoryBackend::new();
    backend.register_procedure(
        "get_top_products",
        Box::new(|params| {
            assert_eq!(param(params, "p_limit"), json!(10));
            assert_eq!(param(params, "p_days"), json!(30));
            Ok(json!([{"sku": "SKU-1", "orders": 12}]))
        }),
    );
    let client = Client::new(backend);
    let result = client.get_top_products(None, None).await.unwrap();
    assert_eq!(result[0]["sku"], json!("SKU-1"));
}

#[tokio::test]
async fn top_products_wrapper_passes_explicit_arguments() {
    let backend = MemoryBackend::new();
    backend.register_procedure(
        "get_top_products",
        Box::new(|params| {
            assert_eq!(param(params, "p_limit"), json!(3));
            assert_eq!(param(params, "p_days"), json!(90));
            Ok(json!([]))
        }),
    );
    let client = Client::new(backend);
    client.get_top_products(Some(3), Some(90)).await.unwrap();
}

#[tokio::test]
async fn agent_stats_defaults_to_seven_days() {
    let backend = MemoryBackend::new();
    backend.register_procedure(
        "get_agent_stats",
        Box::new(|params| {
            assert_eq!(param(params, "p_days"), json!(7));
            Ok(json!([]))
        }),
    );
    let client = Client::new(backend);
    client.get_agent_stats(None).await.unwrap();
}

#[tokio::test]
async fn daily_analytics_without_date_sends_null() {
    let backend = MemoryBackend::new();
    backend.register_procedure(
        "get_daily_analytics",
        Box::new(|params| {
            assert_eq!(param(params, "p_date"), Value::Null);
            Ok(json!({"orders": 0}))
        }),
    );
    let client = Client::new(backend);
    client.get_daily_analytics(None).await.unwrap();
}

#[tokio::test]
async fn daily_analytics_date_is_iso_formatted() {
    let backend = MemoryBackend::new();
    backend.register_procedure(
        "get_daily_analytics",
        Box::new(|params| {
            assert_eq!(param(params, "p_date"), json!("2026-08-15"));
            Ok(json!({"orders": 4}))
        }),
    );
    let client = Client::new(backend);
    let date = NaiveDate::from_ymd_opt(2026, 8, 15).unwrap();
    client.get_daily_analytics(Some(date)).await.unwrap();
}

#[tokio::test]
async fn system_state_sends_no_parameters() {
    let backend = MemoryBackend::new();
    backend.register_procedure(
        "get_system_state",
        Box::new(|params| {
            assert!(params.is_empty());
            Ok(json!({"paused": false}))
        }),
    );
    let client = Client::new(backend);
    let state = client.get_system_state().await.unwrap();
    assert_eq!(state["paused"], json!(false));
}

#[tokio::test]
async fn custom_defaults_reach_the_wire() {
    let backend = MemoryBackend::new();
    backend.register_procedure(
        "get_top_products",
        Box::new(|params| {
            assert_eq!(param(params, "p_limit"), json!(25));
            assert_eq!(param(params, "p_days"), json!(60));
            Ok(json!([]))
        }),
    );
    let defaults = RpcDefaults {
        top_products_limit: 25,
        top_products_days: 60,
        ..RpcDefaults::default()
    };
    let client = Client::with_defaults(backend, defaults);
    client.get_top_products(None, None).await.unwrap();
}

#[tokio::test]
async fn price_change_under_threshold_is_allowed() {
    let client = Client::new(price_change_backend());
    let result = client.validate_price_change(42, 110.0, None).await.unwrap();
    assert_eq!(result["allowed"], json!(true));
}

#[tokio::test]
async fn price_change_over_threshold_is_rejected() {
    let client = Client::new(price_change_backend());
    let result = client.validate_price_change(42, 131.0, None).await.unwrap();
    assert_eq!(result["allowed"], json!(false));
}

#[tokio::test]
async fn price_change_at_exact_threshold_is_allowed() {
    // 100 -> 130 is exactly a 30% change; only strictly-greater changes
    // are rejected.
    let client = Client::new(price_change_backend());
    let result = client.validate_price_change(42, 130.0, None).await.unwrap();
    assert_eq!(result["allowed"], json!(true));
    assert_eq!(result["change_percent"], json!(30.0));
}

#[tokio::test]
async fn procedure_failure_propagates_unchanged() {
    let client = Client::new(price_change_backend());
    let err = client
        .validate_price_change(7, 110.0, None)
        .await
        .unwrap_err();
    match err {
        ApiError::Procedure { name, message } => {
            assert_eq!(name, "validate_price_change");
            assert_eq!(message, "listing not found");
        }
        other => panic!("expected procedure error, got {other:?}"),
    }
}
