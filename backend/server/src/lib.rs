//! Engagement backend for a blog platform.
//!
//! # General Infrastructure
//! - Posts and follow edges are owned by the relational store, reached through [`directory`]
//! - Redis holds derived indexes that a relational query can't serve cheaply
//! - Handlers receive the signed-in user from the `x-user-id` header set by the auth layer
//!
//!
//!
//! # Features
//!
//! ## Likes
//! Sorted set per post of who liked it and when. Membership answers "did I
//! like this", rank order gives the first likers. The post row keeps a
//! counter that follows the set, see [`likes`].
//!
//! ## Follow Feed
//! Fan-out on write into a sorted set per follower, scrolled with a
//! `(min_time, offset)` cursor that survives equal timestamps, see [`feed`].
//!
//! ## Sign-ins
//! One bit per day per month, streak read back with a single `BITFIELD`, see [`sign`].
//!
//!
//!
//! # Notes
//!
//! ## Consistency
//! The like counter and the like-set are written in two steps. Counter first,
//! set only if the counter write went through. Drift is possible under
//! concurrent toggles by the same user and is repaired with
//! `POST /blog/reconcile/{id}`.
//!
//! ## Timeouts
//! Every Redis call is bounded by `STORE_TIMEOUT_MS`. Nothing is retried in
//! here; a failed call is a 503 to the client.
//!
//!
//!
//! # Setup
//!
//! Run against a local Redis.
//! ```sh
//! REDIS_URL=redis://127.0.0.1:6379 RUST_LOG=server=debug,tower_http=info cargo run -p server
//! ```
//!
//! Seed some data and walk the feed.
//! ```sh
//! cargo run -p tester -- --followers 3 --posts 7
//! ```
use std::{sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    Router,
    http::{HeaderName, Method, header::CONTENT_TYPE},
    routing::{get, post, put},
};
use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod blog;
pub mod config;
pub mod database;
pub mod directory;
pub mod error;
pub mod feed;
pub mod keys;
pub mod likes;
pub mod models;
pub mod routes;
pub mod sign;
pub mod state;
pub mod store;
pub mod utils;

use routes::{
    author_handler, blog_handler, follow_feed_handler, follow_handler, hot_handler,
    is_following_handler, like_handler, likers_handler, reconcile_handler, save_blog_handler,
    sign_count_handler, sign_handler,
};
use state::AppState;
use utils::USER_HEADER;

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(USER_HEADER)])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/blog", post(save_blog_handler))
        .route("/blog/{id}", get(blog_handler))
        .route("/blog/hot", get(hot_handler))
        .route("/blog/like/{id}", put(like_handler))
        .route("/blog/likes/{id}", get(likers_handler))
        .route("/blog/reconcile/{id}", post(reconcile_handler))
        .route("/blog/of/user", get(author_handler))
        .route("/blog/of/follow", get(follow_feed_handler))
        .route("/follow/{id}/{is_follow}", put(follow_handler))
        .route("/follow/or/not/{id}", get(is_following_handler))
        .route("/user/sign", post(sign_handler))
        .route("/user/sign/count", get(sign_count_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = ctrl_c().await {
            warn!(%error, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(error) => {
                warn!(%error, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
