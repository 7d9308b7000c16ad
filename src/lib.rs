pub mod authentication;
mod config;
mod data_formats;
pub mod db_helpers;
pub mod errors;
mod handlers;
pub mod models;
mod slug;

use anyhow::Context;
pub use anyhow::Result;
use axum::http::StatusCode;
use axum::{routing::*, Extension, Json, Router};
pub use authentication::TokenCodec;
pub use config::Config;
pub use data_formats::*;
use handlers::*;
pub use slug::slugify;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use std::{
    net::{SocketAddr, TcpListener},
    sync::Arc,
};
use tower_http::trace::TraceLayer;

pub type JsonResponse<T> = (StatusCode, Json<T>);

/// Everything a request handler needs, injected once at startup: the
/// connection pool and the token codec carrying the signing secret.
pub struct AppState {
    pub pool: SqlitePool,
    pub tokens: TokenCodec,
}

pub async fn serve(config: Config, address: SocketAddr) -> Result<()> {
    let pool = init_db(&config.database_url).await?;
    let state = AppState {
        pool,
        tokens: TokenCodec::new(config.jwt_secret),
    };
    run_app(make_app(state), address).await
}

pub async fn run_app(app: Router, address: SocketAddr) -> Result<()> {
    axum::Server::bind(&address)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

pub async fn init_db(db_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
        tracing::info!(%db_url, "creating database");
        Sqlite::create_database(db_url)
            .await
            .context("Failed to create database")?;
    }
    let pool = SqlitePool::connect(db_url).await?;
    tracing::info!("running migrations");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    Ok(pool)
}

pub fn get_random_free_port() -> (u16, SocketAddr) {
    let listener = TcpListener::bind("localhost:0").unwrap();
    match listener.local_addr() {
        Ok(addr) => (addr.port(), addr),
        Err(_) => panic!("Could not get a free port"),
    }
}

/// Route table with state and request tracing layered on.
pub fn make_app(state: AppState) -> Router {
    make_router()
        .layer(Extension(Arc::new(state)))
        .layer(TraceLayer::new_for_http())
}

pub fn make_router() -> Router {
    Router::new()
        .route("/check_health", get(alive))
        .route("/users/login", post(login_user))
        .route("/users", post(register_user))
        .route("/user", get(get_current_user).put(update_user))
        .route("/profiles/:username", get(get_profile))
        .route(
            "/profiles/:username/follow",
            post(follow_profile).delete(unfollow_profile),
        )
        .route("/articles", get(list_articles).post(create_article))
        .route("/articles/feed", get(feed_articles))
        .route(
            "/articles/:slug",
            get(get_article).put(update_article).delete(delete_article),
        )
        .route(
            "/articles/:slug/favorite",
            post(favourite_article).delete(unfavourite_article),
        )
        .route(
            "/articles/:slug/comments",
            get(list_comments).post(add_comment),
        )
        .route("/articles/:slug/comments/:comment_id", delete(delete_comment))
        .route("/tags", get(list_tags))
        .fallback(not_found)
}
