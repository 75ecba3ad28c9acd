// API routes and handlers

pub mod appointments;
pub mod auth;
pub mod clients;
pub mod error;
pub mod exercises;
pub mod health;
pub mod notifications;
pub mod nutrition;
pub mod payments;
pub mod progress;
pub mod reminders;
pub mod routes;
pub mod routines;
pub mod state;
pub mod trainers;
pub mod whatsapp;

pub use error::ApiError;
pub use state::AppState;
