use std::{env, str::FromStr};

use anyhow::Context;
use rust_decimal::Decimal;

use crate::pricing::PricingPolicy;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub stripe: StripeConfig,
    pub pricing: PricingPolicy,
    pub admin_site: AdminSiteConfig,
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub publishable_key: String,
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_base: String,
    pub currency: String,
    /// Maximum age of a signed webhook timestamp, in seconds.
    pub webhook_tolerance_secs: i64,
}

#[derive(Debug, Clone)]
pub struct AdminSiteConfig {
    pub site_header: String,
    pub site_title: String,
    pub index_title: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;

        let stripe = StripeConfig {
            publishable_key: env::var("STRIPE_PUBLISHABLE_KEY").unwrap_or_default(),
            secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .context("STRIPE_WEBHOOK_SECRET is not set")?,
            api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "usd".to_string()),
            webhook_tolerance_secs: parse_or("WEBHOOK_TOLERANCE_SECS", 300)?,
        };

        let pricing = PricingPolicy {
            tax_rate: parse_or("TAX_RATE", Decimal::new(8, 2))?,
            free_shipping_threshold: parse_or("FREE_SHIPPING_THRESHOLD", 10_000)?,
            flat_shipping_fee: parse_or("FLAT_SHIPPING_FEE", 1_000)?,
        };

        let admin_site = AdminSiteConfig {
            site_header: env::var("ADMIN_SITE_HEADER")
                .unwrap_or_else(|_| "Side Wind Admin".to_string()),
            site_title: env::var("ADMIN_SITE_TITLE")
                .unwrap_or_else(|_| "Side Wind Admin Portal".to_string()),
            index_title: env::var("ADMIN_INDEX_TITLE")
                .unwrap_or_else(|_| "Welcome to Side Wind Admin Portal".to_string()),
        };

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            stripe,
            pricing,
            admin_site,
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}")),
        Err(_) => Ok(default),
    }
}
