use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use mongodb::bson::DateTime as BsonDateTime;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::auth::{AdminUser, AuthUser};
use crate::invoice::render_invoice;
use crate::model::mongo_model::{Order, OrderItem};
use crate::model::{OrderStatus, PaymentStatus};
use crate::web::{ApiError, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order).get(get_my_orders))
        .route("/all", get(get_all_orders))
        .route("/{id}/status", put(update_order_status))
        .route("/{id}/invoice", get(get_order_invoice))
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItemView {
    pub book: String,
    pub qty: i32,
    pub price_at_purchase: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: String,
    pub items: Vec<OrderItemView>,
    pub total: f64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub payment_id: Option<String>,
    pub created_at: String,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        OrderView {
            id: order._id.to_hex(),
            user: order.user.to_hex(),
            items: order
                .items
                .iter()
                .map(|item| OrderItemView {
                    book: item.book.to_hex(),
                    qty: item.qty,
                    price_at_purchase: item.price_at_purchase,
                })
                .collect(),
            total: order.total,
            status: order.status,
            payment_status: order.payment_status,
            payment_method: order.payment_method.clone(),
            payment_id: order.payment_id.clone(),
            created_at: order.created_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub book_id: Option<String>,
    pub qty: Option<i32>,
}

// `total` is accepted for wire compatibility but recomputed from the catalog;
// the stored snapshot never trusts client-side prices.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Option<Vec<OrderItemRequest>>,
    #[allow(dead_code)]
    pub total: Option<f64>,
}

fn parse_order_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::Validation("Invalid order id".to_string()))
}

pub async fn create_order(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let requested = body.items.unwrap_or_default();
    if requested.is_empty() {
        return Err(ApiError::Validation("No items to order".to_string()));
    }

    let mut items = Vec::with_capacity(requested.len());
    let mut total = 0.0;
    for entry in requested {
        let qty = entry.qty.unwrap_or(1);
        if qty < 1 {
            return Err(ApiError::Validation(
                "Quantity must be at least 1".to_string(),
            ));
        }
        let book_id = entry
            .book_id
            .as_deref()
            .and_then(|raw| ObjectId::parse_str(raw).ok())
            .ok_or_else(|| ApiError::Validation("Invalid book id".to_string()))?;
        let book = state
            .books
            .get_book(book_id)
            .await?
            .ok_or_else(|| ApiError::Validation("Unknown book in order".to_string()))?;

        total += book.price * f64::from(qty);
        items.push(OrderItem {
            book: book._id,
            qty,
            price_at_purchase: book.price,
        });
    }

    let payment_status = if total == 0.0 {
        PaymentStatus::Free
    } else {
        PaymentStatus::Pending
    };

    let now = BsonDateTime::now();
    let order = Order {
        _id: ObjectId::new(),
        user: auth.id,
        items,
        total,
        status: OrderStatus::Placed,
        payment_status,
        payment_method: None,
        payment_id: None,
        created_at: now,
        updated_at: now,
    };
    state.orders.insert_order(&order).await?;
    tracing::info!(order_id = %order._id, user_id = %auth.id, total, "order placed");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Order placed successfully",
            "order": OrderView::from(&order),
        })),
    ))
}

pub async fn get_my_orders(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    let orders = state.orders.get_orders_for_user(auth.id).await?;
    Ok(Json(orders.iter().map(OrderView::from).collect()))
}

pub async fn get_all_orders(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    let orders = state.orders.get_all_orders().await?;
    Ok(Json(orders.iter().map(OrderView::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

pub async fn update_order_status(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_order_id(&id)?;
    let requested = body
        .status
        .ok_or_else(|| ApiError::Validation("status is required".to_string()))?;
    let status = OrderStatus::from_str(&requested).map_err(|_| {
        ApiError::Validation(
            "Invalid status. Allowed: placed, shipped, delivered, cancelled".to_string(),
        )
    })?;

    let order = state
        .orders
        .get_order(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;
    if order.status.is_terminal() {
        return Err(ApiError::Validation(format!(
            "Order is already {}",
            order.status
        )));
    }

    let updated = state
        .orders
        .update_order_status(id, status)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;
    tracing::info!(order_id = %id, status = %status, "order status updated");

    Ok(Json(json!({
        "message": "Order status updated",
        "order": OrderView::from(&updated),
    })))
}

pub async fn get_order_invoice(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_order_id(&id)?;
    let order = state
        .orders
        .get_order(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;
    if order.user != auth.id && !auth.is_admin() {
        return Err(ApiError::Forbidden("Not allowed".to_string()));
    }

    let customer = state
        .users
        .find_user_by_id(order.user)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let mut books = Vec::with_capacity(order.items.len());
    for item in &order.items {
        if let Some(book) = state.books.get_book(item.book).await? {
            books.push(book);
        }
    }

    let bytes = render_invoice(&order, &customer, &books).map_err(ApiError::Internal)?;
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"invoice-{}.pdf\"", order._id.to_hex()),
        ),
    ];
    Ok((headers, bytes))
}
