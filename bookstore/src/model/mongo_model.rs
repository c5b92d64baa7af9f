use mongodb::bson::DateTime as BsonDateTime;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::model::{OrderStatus, PaymentProvider, PaymentState, PaymentStatus, Role};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub _id: ObjectId,
    pub fullname: String,
    /// Stored lowercased; a unique index on this field enforces uniqueness.
    pub email: String,
    /// bcrypt hash, never the plaintext.
    pub password: String,
    pub role: Role,
    pub avatar_url: String,
    pub reset_password_token: Option<String>,
    pub reset_password_expires: Option<BsonDateTime>,
    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub _id: ObjectId,
    pub name: String,
    pub title: String,
    pub price: f64,
    pub category: String,
    pub genre: Option<String>,
    pub publisher: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub pages: Option<i32>,
    pub image: String,
    pub description: String,
    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,
}

/// Immutable snapshot of one cart line at checkout time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub book: ObjectId,
    pub qty: i32,
    pub price_at_purchase: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub _id: ObjectId,
    pub user: ObjectId,
    pub items: Vec<OrderItem>,
    pub total: f64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub payment_id: Option<String>,
    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub _id: ObjectId,
    pub user: ObjectId,
    pub order: Option<ObjectId>,
    pub amount: f64,
    pub currency: String,
    pub provider: PaymentProvider,
    pub status: PaymentState,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub gateway_signature: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,
}
