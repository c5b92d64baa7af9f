use serde::{Deserialize, Serialize};
use std::error::Error;
use strum_macros::{Display as EnumDisplay, EnumString};

pub mod mongo_model;

pub type GenericError = Box<dyn Error + Send + Sync>;

/// Account role carried in the bearer token. Clients can never set this at
/// signup; promotion to `admin` happens out of band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumDisplay, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Order lifecycle: placed -> shipped -> delivered, or cancelled.
/// `delivered` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumDisplay, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    Placed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

/// Payment state of an order, distinct from the order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumDisplay, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Free,
}

/// State of a payment record itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumDisplay, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentState {
    Created,
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumDisplay, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentProvider {
    Demo,
    Razorpay,
}

/// Aggregated view over successful payments for the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentStats {
    pub total_revenue: f64,
    pub total_payments: i64,
    pub daily: Vec<DailyPaymentStat>,
}

/// One day's worth of successful payments; `date` is `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPaymentStat {
    pub date: String,
    pub amount: f64,
    pub count: i64,
}
