use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use roombook::config::AppConfig;
use roombook::db;
use roombook::handlers;
use roombook::services::cache::{InMemoryCache, NoopCache, ReferenceCache};
use roombook::services::catalog::Catalog;
use roombook::services::notify::sms::SmsNotifier;
use roombook::services::notify::{BookingNotifier, LogNotifier};
use roombook::services::payment_qr::{NoQrProvider, PaymentQrProvider, VietQrProvider};
use roombook::services::sweeper::Sweeper;
use roombook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let db = Arc::new(Mutex::new(conn));

    let cache: Arc<dyn ReferenceCache> = if config.catalog_cache_ttl_secs > 0 {
        Arc::new(InMemoryCache::new(Duration::from_secs(config.catalog_cache_ttl_secs)))
    } else {
        tracing::info!("catalog cache disabled");
        Arc::new(NoopCache)
    };

    let qr: Box<dyn PaymentQrProvider> = if config.bank.account_number.is_empty() {
        tracing::warn!("BANK_ACCOUNT_NUMBER not set, payment QR codes disabled");
        Box::new(NoQrProvider)
    } else {
        Box::new(VietQrProvider::new(config.qr_service_url.clone()))
    };

    let notifier: Box<dyn BookingNotifier> = if config.twilio_account_sid.is_empty() {
        tracing::info!("Twilio not configured, confirmations are only logged");
        Box::new(LogNotifier)
    } else {
        Box::new(SmsNotifier::new(
            config.twilio_account_sid.clone(),
            config.twilio_auth_token.clone(),
            config.twilio_phone_number.clone(),
            config.business_utc_offset_minutes,
        ))
    };

    for (name, value) in [
        ("GATEWAY_SECRET_KEY", &config.gateway_secret_key),
        ("BANK_WEBHOOK_TOKEN", &config.bank_webhook_token),
        ("SWEEP_SECRET", &config.sweep_secret),
        ("ADMIN_TOKEN", &config.admin_token),
    ] {
        if value.is_empty() {
            tracing::warn!("{name} not set, its endpoints will answer 503");
        }
    }

    let sweeper = Arc::new(Sweeper::new(
        Arc::clone(&db),
        chrono::Duration::minutes(config.booking_timeout_minutes),
    ));
    if config.sweep_in_process {
        tokio::spawn(
            Arc::clone(&sweeper).run_forever(Duration::from_secs(config.sweep_interval_secs.max(1))),
        );
    }

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        catalog: Catalog::new(cache),
        qr,
        notifier,
        sweeper,
    });

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
