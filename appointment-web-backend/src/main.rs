use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use appointment_web_backend::{make_app, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,appointment_web_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    let st = AppState::from_env().await;
    let addr = st.settings().bind_addr.clone();
    let app = make_app(st);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await.unwrap();
}
