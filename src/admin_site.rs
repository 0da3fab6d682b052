use serde::Serialize;
use utoipa::ToSchema;

use crate::config::AdminSiteConfig;

/// Back-office branding, built once at startup and shared read-only.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminSite {
    pub site_header: String,
    pub site_title: String,
    pub index_title: String,
    pub sections: Vec<AdminSection>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminSection {
    pub name: String,
    pub path: String,
}

impl AdminSite {
    pub fn init(config: &AdminSiteConfig) -> Self {
        let sections = [
            ("Orders", "/api/admin/orders"),
            ("Carts", "/api/admin/carts"),
            ("Low stock", "/api/admin/inventory/low-stock"),
        ]
        .into_iter()
        .map(|(name, path)| AdminSection {
            name: name.to_string(),
            path: path.to_string(),
        })
        .collect();

        tracing::debug!(header = %config.site_header, "admin site initialised");

        Self {
            site_header: config.site_header.clone(),
            site_title: config.site_title.clone(),
            index_title: config.index_title.clone(),
            sections,
        }
    }
}
