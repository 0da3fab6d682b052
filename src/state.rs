use std::sync::Arc;

use crate::{
    admin_site::AdminSite,
    config::AppConfig,
    db::{DbPool, OrmConn, orm_from_pool},
    payments::PaymentGateway,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub payments: Arc<dyn PaymentGateway>,
    pub admin_site: Arc<AdminSite>,
}

impl AppState {
    pub fn new(pool: DbPool, config: AppConfig, payments: Arc<dyn PaymentGateway>) -> Self {
        let orm = orm_from_pool(&pool);
        let admin_site = Arc::new(AdminSite::init(&config.admin_site));
        Self {
            pool,
            orm,
            config: Arc::new(config),
            payments,
            admin_site,
        }
    }
}
