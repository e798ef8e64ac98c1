// handlers/mod.rs
//
// Public:        GET /, GET /health, POST /auth/login
// Per-resource:  /{collection}[/:id], gated by each resource's AccessPolicy
// Authenticated: GET /auth/whoami
pub mod auth;
pub mod resource;
pub mod system;
