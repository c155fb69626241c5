/// Community Service Library
///
/// One Actix process hosting the Agora community apps: a parenting forum
/// with threaded comments, the Laika pet board, a marketplace, tennis
/// matchmaking, scratch test posts and WebSocket chat rooms, plus accounts
/// and a token-authenticated REST API over the first four.
///
/// # Modules
///
/// - `handlers`: page and API request handlers
/// - `routes`: the URL table
/// - `db`: repositories over PostgreSQL
/// - `models`: stored rows and their serialized shapes
/// - `middleware`: session guard and user extractors
/// - `websocket`: chat room fan-out
/// - `media`: uploaded image storage
/// - `startup`: logging, database and server bootstrap
pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod media;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod search;
pub mod security;
pub mod services;
pub mod startup;
pub mod validators;
pub mod websocket;

pub use config::Config;
pub use error::{AppError, Result};
