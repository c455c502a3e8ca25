pub mod assets;
pub mod auth;
pub mod backup;
pub mod check_outs;
pub mod common;
pub mod employees;
pub mod lookups;
pub mod so_sessions;
pub mod users;

use std::sync::Arc;

use crate::{
    auth::AuthService,
    backup::{BackupService, BackupSettings},
    config::AppConfig,
    db::DbPool,
    services::{
        asset_number::AssetNumberService, assets::AssetService, check_outs::CheckoutService,
        csv::CsvService, employees::EmployeeService, lookups::LookupService,
        so_sessions::SoSessionService, users::UserService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub assets: Arc<AssetService>,
    pub employees: Arc<EmployeeService>,
    pub lookups: Arc<LookupService>,
    pub users: Arc<UserService>,
    pub sessions: Arc<SoSessionService>,
    pub checkouts: Arc<CheckoutService>,
    pub csv: Arc<CsvService>,
    pub backup: Arc<BackupService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig, auth_service: Arc<AuthService>) -> Self {
        let numbers = AssetNumberService::new(db_pool.clone(), config.asset_number_prefix_width);
        let assets = AssetService::new(db_pool.clone(), numbers);
        let employees = EmployeeService::new(db_pool.clone());
        let csv = CsvService::new(assets.clone(), employees.clone());

        Self {
            assets: Arc::new(assets),
            employees: Arc::new(employees),
            lookups: Arc::new(LookupService::new(db_pool.clone())),
            users: Arc::new(UserService::new(db_pool.clone(), auth_service)),
            sessions: Arc::new(SoSessionService::new(db_pool.clone())),
            checkouts: Arc::new(CheckoutService::new(db_pool.clone())),
            csv: Arc::new(csv),
            backup: Arc::new(BackupService::new(db_pool, BackupSettings::from(config))),
        }
    }
}
