use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, NaiveTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::auth::{AdminUser, AuthUser};
use crate::model::mongo_model::Payment;
use crate::model::{PaymentProvider, PaymentState, PaymentStats, PaymentStatus};
use crate::web::{ApiError, AppState};

/// The dashboard chart covers the last 7 days, today included.
const STATS_WINDOW_DAYS: i64 = 7;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_payment).get(get_my_payments))
        .route("/all", get(get_all_payments))
        .route("/stats", get(get_payment_stats))
        .route("/razorpay/create-order", post(create_razorpay_order))
        .route("/razorpay/verify", post(verify_razorpay_payment))
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentView {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: String,
    pub order: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub provider: PaymentProvider,
    pub status: PaymentState,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

impl From<&Payment> for PaymentView {
    fn from(payment: &Payment) -> Self {
        PaymentView {
            id: payment._id.to_hex(),
            user: payment.user.to_hex(),
            order: payment.order.map(|id| id.to_hex()),
            amount: payment.amount,
            currency: payment.currency.clone(),
            provider: payment.provider,
            status: payment.status,
            gateway_order_id: payment.gateway_order_id.clone(),
            gateway_payment_id: payment.gateway_payment_id.clone(),
            reference: payment.reference.clone(),
            notes: payment.notes.clone(),
            created_at: payment
                .created_at
                .try_to_rfc3339_string()
                .unwrap_or_default(),
        }
    }
}

/// Resolves an optional order id from a request body: absent is fine,
/// malformed is 400, unknown is 404.
async fn resolve_order(
    state: &AppState,
    order_id: Option<String>,
) -> Result<Option<ObjectId>, ApiError> {
    let Some(raw) = order_id else {
        return Ok(None);
    };
    let id = ObjectId::parse_str(&raw)
        .map_err(|_| ApiError::Validation("Invalid order id".to_string()))?;
    state
        .orders
        .get_order(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;
    Ok(Some(id))
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: Option<String>,
    pub amount: Option<f64>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

pub async fn create_payment(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let amount = body
        .amount
        .ok_or_else(|| ApiError::Validation("Amount is required".to_string()))?;
    if amount < 0.0 {
        return Err(ApiError::Validation(
            "amount must not be negative".to_string(),
        ));
    }
    let order = resolve_order(&state, body.order_id).await?;

    let now = BsonDateTime::now();
    let payment = Payment {
        _id: ObjectId::new(),
        user: auth.id,
        order,
        amount,
        currency: "INR".to_string(),
        provider: PaymentProvider::Demo,
        // A real integration would flip this from a gateway callback.
        status: PaymentState::Success,
        gateway_order_id: None,
        gateway_payment_id: None,
        gateway_signature: None,
        reference: body.reference,
        notes: body.notes,
        created_at: now,
        updated_at: now,
    };
    state.payments.insert_payment(&payment).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Payment recorded (demo)",
            "payment": PaymentView::from(&payment),
        })),
    ))
}

pub async fn get_my_payments(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<PaymentView>>, ApiError> {
    let payments = state.payments.get_payments_for_user(auth.id).await?;
    Ok(Json(payments.iter().map(PaymentView::from).collect()))
}

pub async fn get_all_payments(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<PaymentView>>, ApiError> {
    let payments = state.payments.get_all_payments().await?;
    Ok(Json(payments.iter().map(PaymentView::from).collect()))
}

pub async fn get_payment_stats(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<PaymentStats>, ApiError> {
    let since = (Utc::now() - Duration::days(STATS_WINDOW_DAYS - 1))
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc();
    let stats = state.payments.get_payment_stats(since).await?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
pub struct CreateGatewayOrderRequest {
    pub order_id: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
}

pub async fn create_razorpay_order(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateGatewayOrderRequest>,
) -> Result<Json<Value>, ApiError> {
    let amount = body
        .amount
        .ok_or_else(|| ApiError::Validation("Amount is required".to_string()))?;
    if amount <= 0.0 {
        return Err(ApiError::Validation(
            "A positive amount is required".to_string(),
        ));
    }
    let order = resolve_order(&state, body.order_id).await?;
    let currency = body.currency.unwrap_or_else(|| "INR".to_string());

    let payment_id = ObjectId::new();
    // The provider bills in currency subunits.
    let amount_subunits = (amount * 100.0).round() as i64;
    let provider_order = state
        .gateway
        .create_order(amount_subunits, &currency, &payment_id.to_hex())
        .await?;

    let now = BsonDateTime::now();
    let payment = Payment {
        _id: payment_id,
        user: auth.id,
        order,
        amount,
        currency: currency.clone(),
        provider: PaymentProvider::Razorpay,
        status: PaymentState::Created,
        gateway_order_id: Some(provider_order.id.clone()),
        gateway_payment_id: None,
        gateway_signature: None,
        reference: None,
        notes: None,
        created_at: now,
        updated_at: now,
    };
    state.payments.insert_payment(&payment).await?;
    tracing::info!(
        payment_id = %payment._id,
        gateway_order_id = %provider_order.id,
        "gateway order created"
    );

    Ok(Json(json!({
        "key_id": state.gateway.key_id(),
        "razorpay_order_id": provider_order.id,
        "amount": provider_order.amount,
        "currency": provider_order.currency,
    })))
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
}

pub async fn verify_razorpay_payment(
    _auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<VerifyPaymentRequest>,
) -> Result<Json<Value>, ApiError> {
    let (Some(order_id), Some(payment_id), Some(signature)) = (
        body.razorpay_order_id,
        body.razorpay_payment_id,
        body.razorpay_signature,
    ) else {
        return Err(ApiError::Validation(
            "order id, payment id and signature are required".to_string(),
        ));
    };

    // The response deliberately carries no detail about what mismatched.
    if !state
        .gateway
        .verify_signature(&order_id, &payment_id, &signature)
    {
        tracing::warn!(gateway_order_id = %order_id, "payment verification failed");
        return Err(ApiError::Validation(
            "Payment verification failed".to_string(),
        ));
    }

    let payment = state
        .payments
        .find_payment_by_gateway_order(&order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Payment not found".to_string()))?;

    // A repeated verify with the same inputs rewrites the same fields.
    state
        .payments
        .mark_payment_result(payment._id, PaymentState::Success, &payment_id, &signature)
        .await?;
    if let Some(order) = payment.order {
        state
            .orders
            .mark_order_paid(order, PaymentStatus::Paid, "razorpay", &payment_id)
            .await?;
    }
    tracing::info!(payment_id = %payment._id, "payment verified");

    Ok(Json(json!({ "message": "Payment verified" })))
}
