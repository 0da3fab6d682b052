use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    admin_site::{AdminSection, AdminSite},
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse},
        cart::{AddToCartRequest, CartLine, CartProduct, CartSummary, CartSummaryList, CartView, UpdateCartRequest},
        catalog::{CategoryDetail, CategoryList, HomePage, ProductDetail, ProductList},
        orders::{CheckoutPreview, CheckoutResponse, OrderList, OrderWithItems, ShippingInfo},
        payments::{PaymentCancelled, WebhookAck},
    },
    models::{Category, Order, OrderItem, OrderStatus, PaymentStatus, Product, User},
    pricing::OrderTotals,
    response::{ApiResponse, Meta},
    routes::{admin, auth, cart, catalog, health, orders, params, payments},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        catalog::home,
        catalog::list_products,
        catalog::get_product,
        catalog::list_categories,
        catalog::get_category,
        cart::cart_detail,
        cart::add_to_cart,
        cart::remove_from_cart,
        cart::update_cart,
        cart::clear_cart,
        orders::checkout_preview,
        orders::checkout,
        orders::list_orders,
        orders::get_order,
        payments::stripe_webhook,
        payments::payment_success,
        payments::payment_cancel,
        admin::admin_site,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_carts,
        admin::list_low_stock,
        admin::adjust_inventory
    ),
    components(
        schemas(
            User,
            Category,
            Product,
            Order,
            OrderItem,
            OrderStatus,
            PaymentStatus,
            OrderTotals,
            AdminSite,
            AdminSection,
            RegisterRequest,
            RegisterResponse,
            LoginRequest,
            LoginResponse,
            AddToCartRequest,
            UpdateCartRequest,
            CartProduct,
            CartLine,
            CartView,
            CartSummary,
            CartSummaryList,
            HomePage,
            ProductList,
            ProductDetail,
            CategoryList,
            CategoryDetail,
            ShippingInfo,
            CheckoutPreview,
            CheckoutResponse,
            OrderList,
            OrderWithItems,
            WebhookAck,
            PaymentCancelled,
            admin::UpdateOrderStatusRequest,
            admin::InventoryAdjustRequest,
            admin::LowStockQuery,
            params::Pagination,
            params::ProductQuery,
            params::ProductSort,
            params::SortOrder,
            params::OrderListQuery,
            params::AdminOrderQuery,
            Meta,
            ApiResponse<CartView>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<ProductList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Catalog", description = "Product and category browsing"),
        (name = "Cart", description = "Cart endpoints, by login or x-session-key"),
        (name = "Orders", description = "Checkout and order tracking"),
        (name = "Payments", description = "Payment provider callbacks and return pages"),
        (name = "Admin", description = "Admin endpoints"),
        (name = "Auth", description = "Authentication endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
