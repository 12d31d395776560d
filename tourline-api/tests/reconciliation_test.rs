use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use tourline_api::state::AuthConfig;
use tourline_api::webhooks::SIGNATURE_HEADER;
use tourline_api::{app, worker, AppState};
use tourline_core::notify::LogMailer;
use tourline_core::package::NewTourPackage;
use tourline_core::payment::PaymentGateway;
use tourline_core::repository::{BookingRepository, PackageRepository};
use tourline_core::TourPackage;
use tourline_gateway::{MockGateway, SignatureVerifier};
use tourline_store::app_config::BusinessRules;
use tourline_store::MemoryStore;

const WEBHOOK_SECRET: &str = "whsec_test123secret456";
const JWT_SECRET: &str = "jwt-test-secret";
const PAN_THRESHOLD: i64 = 20_000_000;

fn test_state_with(gateway: Arc<dyn PaymentGateway>) -> (Arc<MemoryStore>, Router) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState {
        packages: store.clone(),
        bookings: store.clone(),
        gateway,
        signatures: SignatureVerifier::new(WEBHOOK_SECRET),
        mailer: Arc::new(LogMailer),
        auth: AuthConfig {
            secret: JWT_SECRET.to_string(),
            expiration: 3600,
        },
        business_rules: BusinessRules {
            reservation_timeout_seconds: 1800,
            sweep_interval_seconds: 60,
            pan_threshold_cents: PAN_THRESHOLD,
        },
    };
    (store, app(state))
}

fn test_state() -> (Arc<MemoryStore>, Router) {
    test_state_with(Arc::new(MockGateway::new()))
}

fn token(sub: &str, role: &str) -> String {
    let claims = tourline_api::auth::Claims {
        sub: sub.to_string(),
        role: role.to_string(),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

async fn publish_package(store: &Arc<MemoryStore>, seats: i32, price_cents: i64) -> TourPackage {
    store
        .create_package(NewTourPackage {
            destination: "Leh".to_string(),
            title: "Ladakh 7-day circuit".to_string(),
            starts_on: chrono::NaiveDate::from_ymd_opt(2026, 10, 4).unwrap(),
            total_seats: seats,
            price_cents,
            child_price_cents: None,
            currency: "INR".to_string(),
        })
        .await
        .unwrap()
}

fn booking_body(package_id: Uuid, party: usize) -> Value {
    let passengers: Vec<Value> = (0..party)
        .map(|i| {
            json!({
                "full_name": format!("Traveler {}", i + 1),
                "age": 30,
                "gender": "OTHER"
            })
        })
        .collect();
    json!({
        "package_id": package_id,
        "passengers": passengers,
        "contact": {
            "name": "Asha Rao",
            "email": "asha@example.com",
            "phone": "+91-9000000000",
            "pan": null
        }
    })
}

async fn post_booking(app: &Router, bearer: &str, body: &Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/bookings")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {}", bearer))
                .body(Body::from(serde_json::to_vec(body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn get_booking(app: &Router, bearer: &str, booking_id: &str) -> Value {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/v1/bookings/{}", booking_id))
                .header("authorization", format!("Bearer {}", bearer))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn captured_event(order_reference: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "event": "payment.captured",
        "data": {
            "order_reference": order_reference,
            "payment_reference": format!("pay_{}", Uuid::new_v4().simple()),
            "amount_cents": 9_000_000
        }
    }))
    .unwrap()
}

async fn deliver_webhook(app: &Router, body: Vec<u8>, signature: &str) -> StatusCode {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/webhooks/payment")
                .header("content-type", "application/json")
                .header(SIGNATURE_HEADER, signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
}

fn sign(body: &[u8]) -> String {
    SignatureVerifier::new(WEBHOOK_SECRET).sign(body)
}

#[tokio::test]
async fn booking_reserves_seats_and_opens_gateway_order() {
    let (store, app) = test_state();
    let pkg = publish_package(&store, 10, 30_000_00).await;
    let bearer = token("user-1", "GUEST");

    let (status, body) = post_booking(&app, &bearer, &booking_body(pkg.id, 3)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount_cents"], 90_000_00_i64);
    assert_eq!(body["status"], "PENDING");
    assert_eq!(store.available_seats(&pkg.id), Some(7));

    let booking_id: Uuid = serde_json::from_value(body["booking_id"].clone()).unwrap();
    assert_eq!(
        body["order_reference"],
        MockGateway::reference_for(booking_id)
    );
}

#[tokio::test]
async fn two_racers_for_the_last_seat_one_wins() {
    let (store, app) = test_state();
    let pkg = publish_package(&store, 1, 30_000_00).await;
    let body = booking_body(pkg.id, 1);

    let token_1 = token("user-1", "GUEST");
    let token_2 = token("user-2", "GUEST");
    let (first, second) = tokio::join!(
        post_booking(&app, &token_1, &body),
        post_booking(&app, &token_2, &body),
    );

    let statuses = [first.0, second.0];
    assert!(statuses.contains(&StatusCode::OK));
    assert!(statuses.contains(&StatusCode::CONFLICT));
    assert_eq!(store.available_seats(&pkg.id), Some(0));
}

#[tokio::test]
async fn overbooked_request_is_rejected_without_side_effects() {
    let (store, app) = test_state();
    let pkg = publish_package(&store, 2, 30_000_00).await;

    let (status, _) = post_booking(&app, &token("user-1", "GUEST"), &booking_body(pkg.id, 3)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(store.available_seats(&pkg.id), Some(2));
}

#[tokio::test]
async fn empty_party_is_rejected() {
    let (store, app) = test_state();
    let pkg = publish_package(&store, 5, 30_000_00).await;

    let (status, _) = post_booking(&app, &token("user-1", "GUEST"), &booking_body(pkg.id, 0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(store.available_seats(&pkg.id), Some(5));
}

#[tokio::test]
async fn pan_required_above_the_amount_threshold() {
    let (store, app) = test_state();
    // Two seats at 1.2L rupees crosses the 2L threshold.
    let pkg = publish_package(&store, 5, 120_000_00).await;
    let bearer = token("user-1", "GUEST");

    let (status, _) = post_booking(&app, &bearer, &booking_body(pkg.id, 2)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(store.available_seats(&pkg.id), Some(5));

    let mut body = booking_body(pkg.id, 2);
    body["contact"]["pan"] = json!("ABCDE1234F");
    let (status, _) = post_booking(&app, &bearer, &body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.available_seats(&pkg.id), Some(3));
}

#[tokio::test]
async fn gateway_outage_rolls_back_the_reservation() {
    let gateway = Arc::new(MockGateway::unavailable());
    let (store, app) = test_state_with(gateway.clone());
    let pkg = publish_package(&store, 5, 30_000_00).await;

    let (status, _) = post_booking(&app, &token("user-1", "GUEST"), &booking_body(pkg.id, 2)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    // Seats must not stay held for an order that was never created.
    assert_eq!(store.available_seats(&pkg.id), Some(5));
    assert_eq!(gateway.created_count(), 0);
}

#[tokio::test]
async fn captured_webhook_confirms_exactly_once() {
    let (store, app) = test_state();
    let pkg = publish_package(&store, 10, 30_000_00).await;
    let bearer = token("user-1", "GUEST");

    let (_, body) = post_booking(&app, &bearer, &booking_body(pkg.id, 3)).await;
    let booking_id = body["booking_id"].as_str().unwrap().to_string();
    let order_reference = body["order_reference"].as_str().unwrap().to_string();
    assert_eq!(store.available_seats(&pkg.id), Some(7));

    let event = captured_event(&order_reference);
    let signature = sign(&event);

    assert_eq!(
        deliver_webhook(&app, event.clone(), &signature).await,
        StatusCode::OK
    );
    let confirmed = get_booking(&app, &bearer, &booking_id).await;
    assert_eq!(confirmed["status"], "CONFIRMED");
    assert_eq!(confirmed["payment_status"], "PAID");
    // Decremented at reservation, not decremented again at confirmation.
    assert_eq!(store.available_seats(&pkg.id), Some(7));

    // At-least-once delivery: redeliveries change nothing.
    for _ in 0..3 {
        assert_eq!(
            deliver_webhook(&app, event.clone(), &signature).await,
            StatusCode::OK
        );
    }
    let after = get_booking(&app, &bearer, &booking_id).await;
    assert_eq!(after["status"], "CONFIRMED");
    assert_eq!(store.available_seats(&pkg.id), Some(7));
}

#[tokio::test]
async fn tampered_webhook_is_rejected_before_any_state_change() {
    let (store, app) = test_state();
    let pkg = publish_package(&store, 10, 30_000_00).await;
    let bearer = token("user-1", "GUEST");

    let (_, body) = post_booking(&app, &bearer, &booking_body(pkg.id, 2)).await;
    let booking_id = body["booking_id"].as_str().unwrap().to_string();
    let order_reference = body["order_reference"].as_str().unwrap().to_string();

    let mut event = captured_event(&order_reference);
    let signature = sign(&event);
    // One flipped bit is enough.
    event[20] ^= 0x01;

    assert_eq!(
        deliver_webhook(&app, event, &signature).await,
        StatusCode::BAD_REQUEST
    );
    let booking = get_booking(&app, &bearer, &booking_id).await;
    assert_eq!(booking["status"], "PENDING");
    assert_eq!(booking["payment_status"], "UNPAID");
}

#[tokio::test]
async fn missing_signature_header_is_rejected() {
    let (_store, app) = test_state();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/webhooks/payment")
                .header("content-type", "application/json")
                .body(Body::from(captured_event("order_whatever")))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_event_type_is_acknowledged_and_ignored() {
    let (store, app) = test_state();
    let pkg = publish_package(&store, 10, 30_000_00).await;
    let bearer = token("user-1", "GUEST");

    let (_, body) = post_booking(&app, &bearer, &booking_body(pkg.id, 2)).await;
    let booking_id = body["booking_id"].as_str().unwrap().to_string();
    let order_reference = body["order_reference"].as_str().unwrap().to_string();

    let event = serde_json::to_vec(&json!({
        "id": "evt_refund",
        "event": "refund.processed",
        "data": { "order_reference": order_reference }
    }))
    .unwrap();
    let signature = sign(&event);

    assert_eq!(deliver_webhook(&app, event, &signature).await, StatusCode::OK);
    let booking = get_booking(&app, &bearer, &booking_id).await;
    assert_eq!(booking["status"], "PENDING");
}

#[tokio::test]
async fn webhook_for_unknown_order_is_acknowledged() {
    let (_store, app) = test_state();
    let event = captured_event("order_never_created");
    let signature = sign(&event);
    assert_eq!(deliver_webhook(&app, event, &signature).await, StatusCode::OK);
}

#[tokio::test]
async fn failed_payment_webhook_releases_seats() {
    let (store, app) = test_state();
    let pkg = publish_package(&store, 6, 30_000_00).await;
    let bearer = token("user-1", "GUEST");

    let (_, body) = post_booking(&app, &bearer, &booking_body(pkg.id, 2)).await;
    let booking_id = body["booking_id"].as_str().unwrap().to_string();
    let order_reference = body["order_reference"].as_str().unwrap().to_string();
    assert_eq!(store.available_seats(&pkg.id), Some(4));

    let event = serde_json::to_vec(&json!({
        "id": "evt_fail",
        "event": "payment.failed",
        "data": { "order_reference": order_reference }
    }))
    .unwrap();
    let signature = sign(&event);

    assert_eq!(
        deliver_webhook(&app, event.clone(), &signature).await,
        StatusCode::OK
    );
    let booking = get_booking(&app, &bearer, &booking_id).await;
    assert_eq!(booking["status"], "FAILED");
    assert_eq!(store.available_seats(&pkg.id), Some(6));

    // Redelivered failure stays a no-op.
    assert_eq!(deliver_webhook(&app, event, &signature).await, StatusCode::OK);
    assert_eq!(store.available_seats(&pkg.id), Some(6));
}

#[tokio::test]
async fn expired_booking_late_webhook_is_a_safe_noop() {
    let (store, app) = test_state();
    let pkg = publish_package(&store, 8, 30_000_00).await;
    let bearer = token("user-1", "GUEST");

    let (_, body) = post_booking(&app, &bearer, &booking_body(pkg.id, 3)).await;
    let booking_id: Uuid = serde_json::from_value(body["booking_id"].clone()).unwrap();
    let order_reference = body["order_reference"].as_str().unwrap().to_string();
    assert_eq!(store.available_seats(&pkg.id), Some(5));

    // Age the booking past the reservation window and sweep.
    store.set_created_at(&booking_id, Utc::now() - Duration::hours(1));
    let bookings: Arc<dyn BookingRepository> = store.clone();
    assert_eq!(worker::sweep_once(&bookings, 1800).await, 1);
    assert_eq!(store.available_seats(&pkg.id), Some(8));

    // The webhook that arrives a moment later must not double-account.
    let event = captured_event(&order_reference);
    let signature = sign(&event);
    assert_eq!(deliver_webhook(&app, event, &signature).await, StatusCode::OK);

    let booking = get_booking(&app, &bearer, &booking_id.to_string()).await;
    assert_eq!(booking["status"], "CANCELLED");
    assert_eq!(booking["payment_status"], "UNPAID");
    assert_eq!(store.available_seats(&pkg.id), Some(8));
}

#[tokio::test]
async fn callback_verify_is_advisory_only() {
    let (store, app) = test_state();
    let pkg = publish_package(&store, 5, 30_000_00).await;
    let bearer = token("user-1", "GUEST");

    let (_, body) = post_booking(&app, &bearer, &booking_body(pkg.id, 1)).await;
    let booking_id = body["booking_id"].as_str().unwrap().to_string();
    let order_reference = body["order_reference"].as_str().unwrap().to_string();

    let signature = SignatureVerifier::new(WEBHOOK_SECRET)
        .sign(format!("{}|pay_123", order_reference).as_bytes());
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/payments/callback-verify")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({
                        "order_reference": order_reference,
                        "payment_reference": "pay_123",
                        "signature": signature
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let verdict: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(verdict["verified"], true);

    // A passing callback is not proof of capture: nothing may move until the
    // webhook lands.
    let booking = get_booking(&app, &bearer, &booking_id).await;
    assert_eq!(booking["status"], "PENDING");
    assert_eq!(booking["payment_status"], "UNPAID");
}
