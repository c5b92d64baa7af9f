use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;
use mongodb::bson::oid::ObjectId;

use crate::model::mongo_model::{Book, Order, Payment, User};
use crate::model::{GenericError, OrderStatus, PaymentState, PaymentStats, PaymentStatus};

pub mod mongo;

pub use mongo::MongoStorage;

/// The document store surfaces a duplicate insert against the unique email
/// index as a driver error; the signup handler maps it to the same response
/// as the pre-insert lookup.
pub fn is_duplicate_key_error(err: &GenericError) -> bool {
    let rendered = err.to_string();
    rendered.contains("E11000") || rendered.contains("duplicate key")
}

#[async_trait]
pub trait UserStorage: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<ObjectId, GenericError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, GenericError>;

    async fn find_user_by_id(&self, id: ObjectId) -> Result<Option<User>, GenericError>;

    async fn find_user_by_reset_token(&self, token: &str)
    -> Result<Option<User>, GenericError>;

    async fn update_fullname(
        &self,
        id: ObjectId,
        fullname: &str,
    ) -> Result<Option<User>, GenericError>;

    async fn update_avatar_url(
        &self,
        id: ObjectId,
        avatar_url: &str,
    ) -> Result<Option<User>, GenericError>;

    async fn set_reset_token(
        &self,
        id: ObjectId,
        token: &str,
        expires: BsonDateTime,
    ) -> Result<(), GenericError>;

    /// Stores the new hash and clears the reset token fields.
    async fn reset_password(
        &self,
        id: ObjectId,
        password_hash: &str,
    ) -> Result<(), GenericError>;
}

#[async_trait]
pub trait BookStorage: Send + Sync {
    async fn insert_book(&self, book: &Book) -> Result<ObjectId, GenericError>;

    async fn get_books(&self) -> Result<Vec<Book>, GenericError>;

    async fn get_book(&self, id: ObjectId) -> Result<Option<Book>, GenericError>;

    async fn update_book(&self, id: ObjectId, book: &Book)
    -> Result<Option<Book>, GenericError>;

    async fn delete_book(&self, id: ObjectId) -> Result<Option<Book>, GenericError>;
}

#[async_trait]
pub trait OrderStorage: Send + Sync {
    async fn insert_order(&self, order: &Order) -> Result<ObjectId, GenericError>;

    async fn get_order(&self, id: ObjectId) -> Result<Option<Order>, GenericError>;

    async fn get_orders_for_user(&self, user: ObjectId) -> Result<Vec<Order>, GenericError>;

    async fn get_all_orders(&self) -> Result<Vec<Order>, GenericError>;

    async fn update_order_status(
        &self,
        id: ObjectId,
        status: OrderStatus,
    ) -> Result<Option<Order>, GenericError>;

    async fn mark_order_paid(
        &self,
        id: ObjectId,
        payment_status: PaymentStatus,
        payment_method: &str,
        payment_id: &str,
    ) -> Result<(), GenericError>;
}

#[async_trait]
pub trait PaymentStorage: Send + Sync {
    async fn insert_payment(&self, payment: &Payment) -> Result<ObjectId, GenericError>;

    async fn get_payments_for_user(
        &self,
        user: ObjectId,
    ) -> Result<Vec<Payment>, GenericError>;

    async fn get_all_payments(&self) -> Result<Vec<Payment>, GenericError>;

    async fn find_payment_by_gateway_order(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<Payment>, GenericError>;

    async fn mark_payment_result(
        &self,
        id: ObjectId,
        status: PaymentState,
        gateway_payment_id: &str,
        gateway_signature: &str,
    ) -> Result<(), GenericError>;

    /// Totals over all successful payments plus per-day buckets since `since`.
    async fn get_payment_stats(
        &self,
        since: DateTime<Utc>,
    ) -> Result<PaymentStats, GenericError>;
}
