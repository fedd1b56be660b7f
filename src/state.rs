use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::catalog::Catalog;
use crate::services::notify::BookingNotifier;
use crate::services::payment_qr::PaymentQrProvider;
use crate::services::sweeper::Sweeper;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub catalog: Catalog,
    pub qr: Box<dyn PaymentQrProvider>,
    pub notifier: Box<dyn BookingNotifier>,
    pub sweeper: Arc<Sweeper>,
}

impl AppState {
    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("database mutex poisoned")))
    }
}
