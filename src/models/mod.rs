// src/models/mod.rs
pub mod auth;
pub mod chat;
pub mod customer;
pub mod message;
pub mod notification;
pub mod session;
pub mod settings;
pub mod typing;
