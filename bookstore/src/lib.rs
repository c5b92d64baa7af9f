pub mod auth;
pub mod email;
pub mod gateway;
pub mod invoice;
pub mod model;
pub mod storage;
pub mod web;
