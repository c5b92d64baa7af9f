use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{self, DateTime as BsonDateTime, Document, doc, to_bson};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::Deserialize;

use crate::model::mongo_model::{Book, Order, Payment, User};
use crate::model::{
    DailyPaymentStat, GenericError, OrderStatus, PaymentState, PaymentStats, PaymentStatus,
};
use crate::storage::{BookStorage, OrderStorage, PaymentStorage, UserStorage};

fn bson_datetime(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

#[derive(Clone)]
pub struct MongoStorage {
    pub client: Client,
    pub database: Database,
}

#[derive(Debug, Deserialize)]
struct TotalsRow {
    #[serde(default)]
    total_revenue: f64,
    #[serde(default)]
    total_payments: i64,
}

#[derive(Debug, Deserialize)]
struct DailyRow {
    #[serde(rename = "_id")]
    date: String,
    amount: f64,
    count: i64,
}

impl MongoStorage {
    pub async fn new(conn_str: &str, db_name: &str) -> Result<Self, GenericError> {
        println!("trying to connect to mongo: {}", conn_str);
        let client = Client::with_uri_str(conn_str).await?;
        let database = client.database(db_name);
        println!("connected to mongo: {}", conn_str);

        let storage = Self { client, database };
        storage.ensure_indexes().await?;
        Ok(storage)
    }

    async fn ensure_indexes(&self) -> Result<(), GenericError> {
        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.users().create_index(email_index).await?;
        Ok(())
    }

    fn users(&self) -> Collection<User> {
        self.database.collection("users")
    }

    fn books(&self) -> Collection<Book> {
        self.database.collection("books")
    }

    fn orders(&self) -> Collection<Order> {
        self.database.collection("orders")
    }

    fn payments(&self) -> Collection<Payment> {
        self.database.collection("payments")
    }
}

#[async_trait]
impl UserStorage for MongoStorage {
    async fn insert_user(&self, user: &User) -> Result<ObjectId, GenericError> {
        self.users().insert_one(user).await?;
        Ok(user._id)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, GenericError> {
        let user = self.users().find_one(doc! { "email": email }).await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: ObjectId) -> Result<Option<User>, GenericError> {
        let user = self.users().find_one(doc! { "_id": id }).await?;
        Ok(user)
    }

    async fn find_user_by_reset_token(
        &self,
        token: &str,
    ) -> Result<Option<User>, GenericError> {
        let user = self
            .users()
            .find_one(doc! { "reset_password_token": token })
            .await?;
        Ok(user)
    }

    async fn update_fullname(
        &self,
        id: ObjectId,
        fullname: &str,
    ) -> Result<Option<User>, GenericError> {
        let updated = self
            .users()
            .find_one_and_update(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "fullname": fullname,
                        "updated_at": BsonDateTime::now(),
                    }
                },
            )
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated)
    }

    async fn update_avatar_url(
        &self,
        id: ObjectId,
        avatar_url: &str,
    ) -> Result<Option<User>, GenericError> {
        let updated = self
            .users()
            .find_one_and_update(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "avatar_url": avatar_url,
                        "updated_at": BsonDateTime::now(),
                    }
                },
            )
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated)
    }

    async fn set_reset_token(
        &self,
        id: ObjectId,
        token: &str,
        expires: BsonDateTime,
    ) -> Result<(), GenericError> {
        self.users()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "reset_password_token": token,
                        "reset_password_expires": expires,
                        "updated_at": BsonDateTime::now(),
                    }
                },
            )
            .await?;
        Ok(())
    }

    async fn reset_password(
        &self,
        id: ObjectId,
        password_hash: &str,
    ) -> Result<(), GenericError> {
        self.users()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "password": password_hash,
                        "reset_password_token": null,
                        "reset_password_expires": null,
                        "updated_at": BsonDateTime::now(),
                    }
                },
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BookStorage for MongoStorage {
    async fn insert_book(&self, book: &Book) -> Result<ObjectId, GenericError> {
        self.books().insert_one(book).await?;
        Ok(book._id)
    }

    async fn get_books(&self) -> Result<Vec<Book>, GenericError> {
        let books = self
            .books()
            .find(doc! {})
            .sort(doc! { "created_at": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(books)
    }

    async fn get_book(&self, id: ObjectId) -> Result<Option<Book>, GenericError> {
        let book = self.books().find_one(doc! { "_id": id }).await?;
        Ok(book)
    }

    async fn update_book(
        &self,
        id: ObjectId,
        book: &Book,
    ) -> Result<Option<Book>, GenericError> {
        let updated = self
            .books()
            .find_one_and_update(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "name": &book.name,
                        "title": &book.title,
                        "price": book.price,
                        "category": &book.category,
                        "genre": to_bson(&book.genre)?,
                        "publisher": to_bson(&book.publisher)?,
                        "author": to_bson(&book.author)?,
                        "language": to_bson(&book.language)?,
                        "pages": to_bson(&book.pages)?,
                        "image": &book.image,
                        "description": &book.description,
                        "updated_at": BsonDateTime::now(),
                    }
                },
            )
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated)
    }

    async fn delete_book(&self, id: ObjectId) -> Result<Option<Book>, GenericError> {
        let deleted = self.books().find_one_and_delete(doc! { "_id": id }).await?;
        Ok(deleted)
    }
}

#[async_trait]
impl OrderStorage for MongoStorage {
    async fn insert_order(&self, order: &Order) -> Result<ObjectId, GenericError> {
        self.orders().insert_one(order).await?;
        Ok(order._id)
    }

    async fn get_order(&self, id: ObjectId) -> Result<Option<Order>, GenericError> {
        let order = self.orders().find_one(doc! { "_id": id }).await?;
        Ok(order)
    }

    async fn get_orders_for_user(&self, user: ObjectId) -> Result<Vec<Order>, GenericError> {
        let orders = self
            .orders()
            .find(doc! { "user": user })
            .sort(doc! { "created_at": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(orders)
    }

    async fn get_all_orders(&self) -> Result<Vec<Order>, GenericError> {
        let orders = self
            .orders()
            .find(doc! {})
            .sort(doc! { "created_at": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        id: ObjectId,
        status: OrderStatus,
    ) -> Result<Option<Order>, GenericError> {
        let updated = self
            .orders()
            .find_one_and_update(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "status": to_bson(&status)?,
                        "updated_at": BsonDateTime::now(),
                    }
                },
            )
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated)
    }

    async fn mark_order_paid(
        &self,
        id: ObjectId,
        payment_status: PaymentStatus,
        payment_method: &str,
        payment_id: &str,
    ) -> Result<(), GenericError> {
        self.orders()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "payment_status": to_bson(&payment_status)?,
                        "payment_method": payment_method,
                        "payment_id": payment_id,
                        "updated_at": BsonDateTime::now(),
                    }
                },
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PaymentStorage for MongoStorage {
    async fn insert_payment(&self, payment: &Payment) -> Result<ObjectId, GenericError> {
        self.payments().insert_one(payment).await?;
        Ok(payment._id)
    }

    async fn get_payments_for_user(
        &self,
        user: ObjectId,
    ) -> Result<Vec<Payment>, GenericError> {
        let payments = self
            .payments()
            .find(doc! { "user": user })
            .sort(doc! { "created_at": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(payments)
    }

    async fn get_all_payments(&self) -> Result<Vec<Payment>, GenericError> {
        let payments = self
            .payments()
            .find(doc! {})
            .sort(doc! { "created_at": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(payments)
    }

    async fn find_payment_by_gateway_order(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<Payment>, GenericError> {
        let payment = self
            .payments()
            .find_one(doc! { "gateway_order_id": gateway_order_id })
            .await?;
        Ok(payment)
    }

    async fn mark_payment_result(
        &self,
        id: ObjectId,
        status: PaymentState,
        gateway_payment_id: &str,
        gateway_signature: &str,
    ) -> Result<(), GenericError> {
        self.payments()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "status": to_bson(&status)?,
                        "gateway_payment_id": gateway_payment_id,
                        "gateway_signature": gateway_signature,
                        "updated_at": BsonDateTime::now(),
                    }
                },
            )
            .await?;
        Ok(())
    }

    async fn get_payment_stats(
        &self,
        since: DateTime<Utc>,
    ) -> Result<PaymentStats, GenericError> {
        let totals_pipeline = vec![
            doc! { "$match": { "status": "success" } },
            doc! { "$group": {
                "_id": null,
                "total_revenue": { "$sum": "$amount" },
                "total_payments": { "$sum": 1 },
            }},
        ];

        let mut cursor = self.payments().aggregate(totals_pipeline).await?;
        let totals = match cursor.try_next().await? {
            Some(row) => bson::from_document::<TotalsRow>(row)?,
            None => TotalsRow {
                total_revenue: 0.0,
                total_payments: 0,
            },
        };

        let daily_pipeline = vec![
            doc! { "$match": {
                "status": "success",
                "created_at": { "$gte": bson_datetime(since) },
            }},
            doc! { "$group": {
                "_id": { "$dateToString": { "format": "%Y-%m-%d", "date": "$created_at" } },
                "amount": { "$sum": "$amount" },
                "count": { "$sum": 1 },
            }},
            doc! { "$sort": { "_id": 1 } },
        ];

        let rows: Vec<Document> = self
            .payments()
            .aggregate(daily_pipeline)
            .await?
            .try_collect()
            .await?;

        let mut daily = Vec::with_capacity(rows.len());
        for row in rows {
            let row: DailyRow = bson::from_document(row)?;
            daily.push(DailyPaymentStat {
                date: row.date,
                amount: row.amount,
                count: row.count,
            });
        }

        Ok(PaymentStats {
            total_revenue: totals.total_revenue,
            total_payments: totals.total_payments,
            daily,
        })
    }
}
