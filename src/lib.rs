//! Leaf photo → plant disease diagnosis with pesticide recommendations.
//!
//! Pipeline: upload bytes → [`decoder`] → [`model::Classifier`] →
//! [`labels`] → [`recommend`] + [`disease_info`] → [`diagnosis`].
//! [`server`] exposes it over HTTP; `leafcheck-diagnose` runs it from the
//! command line.

pub mod config;
pub mod decoder;
pub mod diagnosis;
pub mod disease_info;
pub mod error;
pub mod labels;
pub mod model;
pub mod recommend;
pub mod server;
pub mod store;
pub mod utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global tracing subscriber. Honors `RUST_LOG`.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leafcheck=info,tower_http=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
