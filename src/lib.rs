pub mod config;
pub mod demo;
pub mod draft;
pub mod error;
pub mod gateway;
pub mod gemini;
pub mod models;
pub mod routes;
pub mod wizard;
