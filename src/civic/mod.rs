//! Civic issue reporting back-end.
//!
//! ## Overview
//!
//! Citizens report location-tagged civic problems (potholes, broken
//! streetlights, garbage, water, traffic). Each issue is owned by the actor
//! who reported it; only the owner may change its status or delete it, while
//! anyone may read it and any authenticated actor may comment on it. Every
//! mutation is pushed to connected dashboards over a WebSocket.
//!
//! ## Module Map
//!
//! ```text
//! ┌───────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │ Dashboard │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │ (browser) │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └───────────┘ WebSocket│         │                                        │
//!                        │         │ IdentityProvider::current_actor()      │
//!                        │         v                                        │
//!                        │  identity.rs  (LocalIdentity, code exchange)     │
//!                        │         │                                        │
//!                        │         │ issues / lifecycle / comments          │
//!                        │         v                                        │
//!                        │  policy.rs  (authorize_issue, Operation)         │
//!                        │         │                                        │
//!                        │         │ IssueRepository                        │
//!                        │         v                                        │
//!                        │  repository.rs → db.rs  (SQLite via DbHandle)    │
//!                        └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module      | Responsibility                                            |
//! |-------------|-----------------------------------------------------------|
//! | `models`    | Shared types: `Issue`, `Comment`, `Actor`, `IssueFilter`  |
//! | `registry`  | `Category` / `IssueStatus` with labels and map colors     |
//! | `geo`       | Coordinate validation, haversine distance, proximity      |
//! | `ws`        | `WsMessage` enum + `broadcast_message()` helper           |
//!
//! ## Typical Request Flow (owner resolves an issue)
//!
//! 1. `PATCH /api/issues/{id}` → `api::update_issue()` resolves the actor
//!    from the bearer token or `civic_session` cookie.
//! 2. `lifecycle::transition()` asks `policy::authorize_issue()` to check
//!    authentication, then existence, then ownership, in that order.
//! 3. The new status is parsed against the registry and written with a
//!    compare-and-set on `version` when the caller sent `expected_version`.
//! 4. The updated issue is returned and broadcast as `IssueUpdated`.

pub mod api;
pub mod comments;
pub mod db;
pub mod geo;
pub mod identity;
pub mod issues;
pub mod lifecycle;
pub mod models;
pub mod policy;
pub mod registry;
pub mod repository;
pub mod server;
pub mod ws;
