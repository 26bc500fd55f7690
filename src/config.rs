//! Configuration loaded from the environment.

use std::env;

/// Publish behavior when individual files fail to upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishPolicy {
    /// Per-file failures are logged and the job still completes.
    BestEffort,
    /// The first failed upload fails the whole job.
    AllOrNothing,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Object-store bucket holding source assets and published output
    pub bucket: String,
    /// Path to the service-account JSON key used for signing and upload auth
    pub credentials_path: String,
    /// Root directory for per-job workspaces
    pub work_dir: String,
    pub publish_policy: PublishPolicy,
    /// Lifetime of signed read URLs, in seconds. V4 signing caps this at
    /// seven days.
    pub signed_url_ttl_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics if required variables are not set.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let publish_policy = match env::var("PUBLISH_POLICY").as_deref() {
            Ok("all-or-nothing") => PublishPolicy::AllOrNothing,
            _ => PublishPolicy::BestEffort,
        };

        Self {
            addr: env::var("ADDR").unwrap_or_else(|_| String::from("127.0.0.1")),
            port: env::var("PORT").unwrap_or_else(|_| String::from("3000")),
            bucket: env::var("BUCKET_NAME").expect("BUCKET_NAME env var required"),
            credentials_path: env::var("GOOGLE_APPLICATION_CREDENTIALS")
                .expect("GOOGLE_APPLICATION_CREDENTIALS env var required"),
            work_dir: env::var("WORK_DIR").unwrap_or_else(|_| String::from("./hls_output")),
            publish_policy,
            signed_url_ttl_secs: env::var("SIGNED_URL_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(604_800),
        }
    }
}
