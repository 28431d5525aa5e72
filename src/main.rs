use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use linkdeck::{
    AppState,
    auth::session::RedisSessionStore,
    config::Config,
    middleware::{log_errors, require_admin, require_auth, session_middleware, verify_csrf},
    routes,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'linkdeck';").await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");

    let state = AppState {
        pool,
        config: config.clone(),
        sessions: Arc::new(RedisSessionStore::new(Arc::new(redis_client))),
    };

    // Anyone may reach these; login itself still has to pass the CSRF gate.
    let public_routes = Router::new()
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/token", get(routes::auth::csrf_token))
        .route("/download/{link_id}", get(routes::download::download))
        .layer(axum::middleware::from_fn(verify_csrf));

    // Authenticated users: navigation, link lists, clicks, own identity.
    let protected_routes = Router::new()
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/me", get(routes::auth::me))
        .route("/pages", get(routes::pages::accessible_pages))
        .route("/pages/{page_id}/links", get(routes::pages::page_links))
        .route("/links/{link_id}/click", post(routes::links::record_click))
        .layer(axum::middleware::from_fn(verify_csrf))
        .layer(axum::middleware::from_fn(require_auth));

    // Administration: portal content and permission grants.
    let admin_routes = Router::new()
        .route("/admin/users", get(routes::users::list_users))
        .route("/admin/users", post(routes::users::create_user))
        .route("/admin/users/{user_id}", put(routes::users::update_user))
        .route("/admin/users/{user_id}", delete(routes::users::delete_user))
        .route(
            "/admin/users/{user_id}/permissions",
            put(routes::permissions::replace_user_grants),
        )
        .route("/admin/pages", get(routes::pages::list_pages))
        .route("/admin/pages", post(routes::pages::create_page))
        .route("/admin/pages/{page_id}", put(routes::pages::update_page))
        .route("/admin/pages/{page_id}", delete(routes::pages::delete_page))
        .route(
            "/admin/pages/{page_id}/permissions",
            get(routes::permissions::page_grants),
        )
        .route("/admin/permissions", post(routes::permissions::set_grant))
        .route("/admin/permissions", delete(routes::permissions::remove_grant))
        .route("/admin/links", post(routes::links::create_link))
        .route("/admin/links/{link_id}", put(routes::links::update_link))
        .route("/admin/links/{link_id}", delete(routes::links::delete_link))
        .route("/admin/uploads", post(routes::links::upload_file))
        .layer(axum::middleware::from_fn(verify_csrf))
        .layer(axum::middleware::from_fn(require_admin));

    let router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes);

    // Session resolution wraps everything; identity exists before any
    // authorization or CSRF check runs.
    let router = router.layer(axum::middleware::from_fn(log_errors)).layer(
        axum::middleware::from_fn_with_state(state.clone(), session_middleware),
    );

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    let app = router.with_state(state.clone());

    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app,
    )
    .await
    .expect("Failed to start server");
}
