use caruso::adapters::ffmpeg::FfmpegTranscoder;
use caruso::adapters::gcs::{GcsStore, ServiceAccountKey};
use caruso::application::pipeline::PipelineService;
use caruso::application::workspace::WorkspaceManager;
use caruso::config::Config;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let key = ServiceAccountKey::from_file(&config.credentials_path)
        .await
        .expect("Failed to load service account key");
    let store = GcsStore::new(config.bucket.clone(), key, config.signed_url_ttl_secs)
        .expect("Failed to initialise object store");

    let pipeline = Arc::new(PipelineService::new(
        store,
        FfmpegTranscoder::new(),
        WorkspaceManager::new(&config.work_dir),
        config.publish_policy,
    ));
    let app = caruso::http::router(pipeline);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.addr, config.port))
        .await
        .expect("Failed to bind TCP listener");
    tracing::info!("listening at {}:{}", config.addr, config.port);
    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
