pub mod admin;
pub mod allocation;
pub mod auth;
pub mod booking;
pub mod catalog;
pub mod payment;
