//! HTTP middleware: authentication and CORS.

pub mod auth;
