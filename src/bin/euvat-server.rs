//! HTTP server exposing the `/eu-vat` routes.
//!
//! Configuration comes from `EU_VAT_*` environment variables (and `.env`);
//! log filtering from `RUST_LOG`.

use std::sync::Arc;

use anyhow::Context;
use euvat::core::Settings;
use euvat::integration::{EuVatFeature, MemorySchema};
use euvat::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("loading settings")?;
    server::telemetry::init();

    let bind_addr = settings.bind_addr.clone();
    let service = Arc::new(euvat::remote::service(settings).context("building VAT service")?);

    let feature = EuVatFeature::new(Arc::clone(&service));
    let schema = MemorySchema::new();
    feature
        .ensure_model_fields(&schema)
        .context("augmenting model schema")?;

    let app = server::router(service);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, own_country = ?feature.service().settings().own_country, "euvat server listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
