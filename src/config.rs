use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,

    pub gateway_partner_code: String,
    pub gateway_access_key: String,
    pub gateway_secret_key: String,
    pub bank_webhook_token: String,
    pub sweep_secret: String,

    pub sweep_interval_secs: u64,
    pub booking_timeout_minutes: i64,
    pub booking_lead_minutes: i64,
    pub sweep_in_process: bool,
    pub business_utc_offset_minutes: i32,

    pub bank: BankAccountConfig,
    pub qr_service_url: String,
    pub catalog_cache_ttl_secs: u64,

    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
}

/// Receiving account shown on the payment instruction screen.
#[derive(Clone, Debug, Default)]
pub struct BankAccountConfig {
    pub bank_name: String,
    pub bank_bin: String,
    pub account_number: String,
    pub account_name: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: parse_var("PORT", 3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "roombook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_default(),
            gateway_partner_code: env::var("GATEWAY_PARTNER_CODE").unwrap_or_default(),
            gateway_access_key: env::var("GATEWAY_ACCESS_KEY").unwrap_or_default(),
            gateway_secret_key: env::var("GATEWAY_SECRET_KEY").unwrap_or_default(),
            bank_webhook_token: env::var("BANK_WEBHOOK_TOKEN").unwrap_or_default(),
            sweep_secret: env::var("SWEEP_SECRET").unwrap_or_default(),
            sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", 60),
            booking_timeout_minutes: parse_var("BOOKING_TIMEOUT_MINUTES", 10),
            booking_lead_minutes: parse_var("BOOKING_LEAD_MINUTES", 5),
            sweep_in_process: parse_var("SWEEP_IN_PROCESS", true),
            business_utc_offset_minutes: parse_var("BUSINESS_UTC_OFFSET_MINUTES", 7 * 60),
            bank: BankAccountConfig {
                bank_name: env::var("BANK_NAME").unwrap_or_default(),
                bank_bin: env::var("BANK_BIN").unwrap_or_default(),
                account_number: env::var("BANK_ACCOUNT_NUMBER").unwrap_or_default(),
                account_name: env::var("BANK_ACCOUNT_NAME").unwrap_or_default(),
            },
            qr_service_url: env::var("QR_SERVICE_URL")
                .unwrap_or_else(|_| "https://api.vietqr.io/v2/generate".to_string()),
            catalog_cache_ttl_secs: parse_var("CATALOG_CACHE_TTL_SECS", 300),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_phone_number: env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
