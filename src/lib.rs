//! Authentication and session service for the shop microservices.
//!
//! Password hashing, signed access tokens and rotating refresh tokens, with
//! PostgreSQL or in-memory storage and an actix-web front.

pub mod auth;
pub mod configuration;
pub mod error;
pub mod logger;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod validators;
