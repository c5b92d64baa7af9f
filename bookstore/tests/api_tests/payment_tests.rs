use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use mongodb::bson::DateTime as BsonDateTime;
use mongodb::bson::oid::ObjectId;
use serde_json::json;
use tower::ServiceExt;

use bookstore::gateway::compute_signature;
use bookstore::model::mongo_model::{Order, OrderItem, Payment};
use bookstore::model::{
    OrderStatus, PaymentProvider, PaymentState, PaymentStatus, Role,
};

use super::mocks::{
    MockGateway, TEST_GATEWAY_SECRET, TestContext, authed_get, authed_json_request,
    create_test_app, response_json, seed_user, test_context, test_context_with_gateway,
};

fn seed_order(context: &TestContext, user: ObjectId) -> Order {
    let now = BsonDateTime::now();
    let order = Order {
        _id: ObjectId::new(),
        user,
        items: vec![OrderItem {
            book: ObjectId::new(),
            qty: 1,
            price_at_purchase: 25.0,
        }],
        total: 25.0,
        status: OrderStatus::Placed,
        payment_status: PaymentStatus::Pending,
        payment_method: None,
        payment_id: None,
        created_at: now,
        updated_at: now,
    };
    context.orders.orders.lock().unwrap().push(order.clone());
    order
}

fn seed_payment(
    context: &TestContext,
    user: ObjectId,
    amount: f64,
    status: PaymentState,
    days_ago: i64,
) -> Payment {
    let stamp = BsonDateTime::from_millis(
        (Utc::now() - Duration::days(days_ago)).timestamp_millis(),
    );
    let payment = Payment {
        _id: ObjectId::new(),
        user,
        order: None,
        amount,
        currency: "INR".to_string(),
        provider: PaymentProvider::Demo,
        status,
        gateway_order_id: None,
        gateway_payment_id: None,
        gateway_signature: None,
        reference: None,
        notes: None,
        created_at: stamp,
        updated_at: stamp,
    };
    context.payments.payments.lock().unwrap().push(payment.clone());
    payment
}

#[tokio::test]
async fn demo_payment_requires_amount() {
    let context = test_context();
    let app = create_test_app(&context);
    let (_, token) = seed_user(&context, Role::User);

    let missing = app
        .clone()
        .oneshot(authed_json_request("POST", "/payments", &token, &json!({})))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    let body = response_json(missing).await;
    assert_eq!(body["message"], "Amount is required");

    let negative = app
        .oneshot(authed_json_request(
            "POST",
            "/payments",
            &token,
            &json!({ "amount": -5.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(negative.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn demo_payment_with_unknown_order_is_404() {
    let context = test_context();
    let app = create_test_app(&context);
    let (_, token) = seed_user(&context, Role::User);

    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/payments",
            &token,
            &json!({ "amount": 25.0, "order_id": ObjectId::new().to_hex() }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn demo_payment_records_success() {
    let context = test_context();
    let app = create_test_app(&context);
    let (user, token) = seed_user(&context, Role::User);
    let order = seed_order(&context, user._id);

    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/payments",
            &token,
            &json!({
                "amount": 25.0,
                "order_id": order._id.to_hex(),
                "reference": "txn-1",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Payment recorded (demo)");
    assert_eq!(body["payment"]["provider"], "demo");
    assert_eq!(body["payment"]["status"], "success");
    assert_eq!(body["payment"]["currency"], "INR");
    assert_eq!(body["payment"]["order"], order._id.to_hex());
}

#[tokio::test]
async fn my_payments_exclude_other_users() {
    let context = test_context();
    let app = create_test_app(&context);
    let (me, my_token) = seed_user(&context, Role::User);
    let (other, _) = seed_user(&context, Role::User);
    seed_payment(&context, me._id, 10.0, PaymentState::Success, 0);
    seed_payment(&context, other._id, 99.0, PaymentState::Success, 0);

    let response = app
        .oneshot(authed_get("/payments", &my_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let payments = body.as_array().unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0]["user"], me._id.to_hex());
}

#[tokio::test]
async fn all_payments_is_admin_only() {
    let context = test_context();
    let app = create_test_app(&context);
    let (user, user_token) = seed_user(&context, Role::User);
    let (_, admin_token) = seed_user(&context, Role::Admin);
    seed_payment(&context, user._id, 10.0, PaymentState::Success, 0);

    let forbidden = app
        .clone()
        .oneshot(authed_get("/payments/all", &user_token))
        .await
        .unwrap();
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let allowed = app
        .oneshot(authed_get("/payments/all", &admin_token))
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
    let body = response_json(allowed).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn stats_aggregate_successful_payments_only() {
    let context = test_context();
    let app = create_test_app(&context);
    let (user, _) = seed_user(&context, Role::User);
    let (_, admin_token) = seed_user(&context, Role::Admin);

    seed_payment(&context, user._id, 100.0, PaymentState::Success, 0);
    seed_payment(&context, user._id, 50.0, PaymentState::Success, 1);
    seed_payment(&context, user._id, 25.0, PaymentState::Success, 1);
    seed_payment(&context, user._id, 999.0, PaymentState::Failed, 0);
    // outside the 7-day chart window but still in the lifetime totals
    seed_payment(&context, user._id, 40.0, PaymentState::Success, 30);

    let response = app
        .oneshot(authed_get("/payments/stats", &admin_token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["total_revenue"], 215.0);
    assert_eq!(body["total_payments"], 4);

    let daily = body["daily"].as_array().unwrap();
    assert_eq!(daily.len(), 2);
    // ascending by date: yesterday before today
    assert_eq!(daily[0]["amount"], 75.0);
    assert_eq!(daily[0]["count"], 2);
    assert_eq!(daily[1]["amount"], 100.0);
    assert_eq!(daily[1]["count"], 1);
}

#[tokio::test]
async fn stats_are_admin_only() {
    let context = test_context();
    let app = create_test_app(&context);
    let (_, token) = seed_user(&context, Role::User);

    let response = app
        .oneshot(authed_get("/payments/stats", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn gateway_order_requires_positive_amount() {
    let context = test_context();
    let app = create_test_app(&context);
    let (_, token) = seed_user(&context, Role::User);

    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/payments/razorpay/create-order",
            &token,
            &json!({ "amount": 0.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn gateway_order_creates_pending_payment() {
    let context = test_context();
    let app = create_test_app(&context);
    let (user, token) = seed_user(&context, Role::User);
    let order = seed_order(&context, user._id);

    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/payments/razorpay/create-order",
            &token,
            &json!({ "amount": 25.0, "order_id": order._id.to_hex() }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["key_id"], "rzp_test_key");
    // the provider bills subunits
    assert_eq!(body["amount"], 2500);
    let gateway_order_id = body["razorpay_order_id"].as_str().unwrap().to_string();

    let stored = context.payments.payments.lock().unwrap();
    let payment = stored
        .iter()
        .find(|payment| payment.gateway_order_id.as_deref() == Some(&gateway_order_id))
        .expect("payment persisted");
    assert_eq!(payment.provider, PaymentProvider::Razorpay);
    assert_eq!(payment.status, PaymentState::Created);
    assert_eq!(payment.amount, 25.0);
    assert_eq!(payment.order, Some(order._id));
}

#[tokio::test]
async fn gateway_failure_surfaces_as_500() {
    let context =
        test_context_with_gateway(Arc::new(MockGateway::failing(TEST_GATEWAY_SECRET)));
    let app = create_test_app(&context);
    let (_, token) = seed_user(&context, Role::User);

    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/payments/razorpay/create-order",
            &token,
            &json!({ "amount": 25.0 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response).await;
    // the gateway error never leaks
    assert_eq!(body["message"], "Internal server error");
    assert!(context.payments.payments.lock().unwrap().is_empty());
}

async fn create_gateway_order(
    app: &axum::Router,
    token: &str,
    order_id: &str,
) -> String {
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/payments/razorpay/create-order",
            token,
            &json!({ "amount": 25.0, "order_id": order_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    body["razorpay_order_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn verify_marks_payment_and_order_paid() {
    let context = test_context();
    let app = create_test_app(&context);
    let (user, token) = seed_user(&context, Role::User);
    let order = seed_order(&context, user._id);
    let gateway_order_id = create_gateway_order(&app, &token, &order._id.to_hex()).await;

    let signature = compute_signature(TEST_GATEWAY_SECRET, &gateway_order_id, "pay_123");
    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/payments/razorpay/verify",
            &token,
            &json!({
                "razorpay_order_id": gateway_order_id,
                "razorpay_payment_id": "pay_123",
                "razorpay_signature": signature,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let payments = context.payments.payments.lock().unwrap();
    let payment = payments
        .iter()
        .find(|payment| payment.gateway_order_id.as_deref() == Some(&gateway_order_id))
        .unwrap();
    assert_eq!(payment.status, PaymentState::Success);
    assert_eq!(payment.gateway_payment_id.as_deref(), Some("pay_123"));

    let orders = context.orders.orders.lock().unwrap();
    let paid = orders.iter().find(|stored| stored._id == order._id).unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.payment_method.as_deref(), Some("razorpay"));
    assert_eq!(paid.payment_id.as_deref(), Some("pay_123"));
}

#[tokio::test]
async fn verify_rejects_tampered_signature() {
    let context = test_context();
    let app = create_test_app(&context);
    let (user, token) = seed_user(&context, Role::User);
    let order = seed_order(&context, user._id);
    let gateway_order_id = create_gateway_order(&app, &token, &order._id.to_hex()).await;

    // signed for a different payment id
    let signature = compute_signature(TEST_GATEWAY_SECRET, &gateway_order_id, "pay_other");
    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/payments/razorpay/verify",
            &token,
            &json!({
                "razorpay_order_id": gateway_order_id,
                "razorpay_payment_id": "pay_123",
                "razorpay_signature": signature,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Payment verification failed");

    let payments = context.payments.payments.lock().unwrap();
    let payment = payments
        .iter()
        .find(|payment| payment.gateway_order_id.as_deref() == Some(&gateway_order_id))
        .unwrap();
    assert_eq!(payment.status, PaymentState::Created);
}

#[tokio::test]
async fn repeated_verify_rewrites_the_same_fields() {
    let context = test_context();
    let app = create_test_app(&context);
    let (user, token) = seed_user(&context, Role::User);
    let order = seed_order(&context, user._id);
    let gateway_order_id = create_gateway_order(&app, &token, &order._id.to_hex()).await;

    let signature = compute_signature(TEST_GATEWAY_SECRET, &gateway_order_id, "pay_123");
    let body = json!({
        "razorpay_order_id": gateway_order_id,
        "razorpay_payment_id": "pay_123",
        "razorpay_signature": signature,
    });

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(authed_json_request(
                "POST",
                "/payments/razorpay/verify",
                &token,
                &body,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let payments = context.payments.payments.lock().unwrap();
    let payment = payments
        .iter()
        .find(|payment| payment.gateway_order_id.as_deref() == Some(&gateway_order_id))
        .unwrap();
    assert_eq!(payment.status, PaymentState::Success);
}

#[tokio::test]
async fn verify_unknown_gateway_order_is_404() {
    let context = test_context();
    let app = create_test_app(&context);
    let (_, token) = seed_user(&context, Role::User);

    let signature = compute_signature(TEST_GATEWAY_SECRET, "order_ghost", "pay_123");
    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/payments/razorpay/verify",
            &token,
            &json!({
                "razorpay_order_id": "order_ghost",
                "razorpay_payment_id": "pay_123",
                "razorpay_signature": signature,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
