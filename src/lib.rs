pub mod application;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::Logger, web, App, HttpServer};
use bigdecimal::BigDecimal;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use application::checkout::{CheckoutPolicy, CheckoutService};
use application::fulfillment::{FulfillmentPolicy, FulfillmentService};
use application::idempotency::InMemoryIdempotencyStore;
use application::scheduler::TokioJobScheduler;
use application::webhook::PaymentWebhookHandler;
use domain::ports::{OrderStore, StockLedger};
use infrastructure::collaborators::{
    DieselCartGateway, DieselCatalog, DieselStoreDirectory, FlatRateShipping,
};
use infrastructure::ledger::DieselStockLedger;
use infrastructure::order_store::DieselOrderStore;

pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) {
    let mut conn = pool.get().expect("Failed to get DB connection for migrations");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run database migrations");
}

// ── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Shared key used to verify gateway webhook signatures.
    pub gateway_server_key: String,
    pub default_store_id: i64,
    /// Minutes before an unpaid order is auto-cancelled.
    pub payment_window_minutes: u64,
    /// Days after shipping before an order is auto-confirmed.
    pub auto_confirm_days: u64,
    /// Seconds a completed checkout answers idempotent retries.
    pub idempotency_ttl_secs: u64,
    pub shipping_method_id: i64,
    pub shipping_flat_cost: BigDecimal,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        EngineConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parsed("PORT", 8080),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            gateway_server_key: env::var("GATEWAY_SERVER_KEY")
                .expect("GATEWAY_SERVER_KEY must be set"),
            default_store_id: env_parsed("DEFAULT_STORE_ID", 1),
            payment_window_minutes: env_parsed("PAYMENT_WINDOW_MINUTES", 60),
            auto_confirm_days: env_parsed("AUTO_CONFIRM_DAYS", 7),
            idempotency_ttl_secs: env_parsed("IDEMPOTENCY_TTL_SECS", 60),
            shipping_method_id: env_parsed("SHIPPING_METHOD_ID", 1),
            shipping_flat_cost: env::var("SHIPPING_FLAT_COST")
                .unwrap_or_else(|_| "3.00".to_string())
                .parse()
                .expect("SHIPPING_FLAT_COST must be a decimal"),
        }
    }

    pub fn payment_window(&self) -> Duration {
        Duration::from_secs(self.payment_window_minutes * 60)
    }

    pub fn confirm_window(&self) -> Duration {
        Duration::from_secs(self.auto_confirm_days * 24 * 60 * 60)
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(value) => match value.parse() {
            Ok(parsed) => parsed,
            Err(_) => panic!("{name} must be a valid number, got '{value}'"),
        },
        Err(_) => default,
    }
}

// ── Composition root ─────────────────────────────────────────────────────────

/// The wired service graph shared by all handlers.
#[derive(Clone)]
pub struct Engine {
    pub checkout: Arc<CheckoutService>,
    pub fulfillment: Arc<FulfillmentService>,
    pub webhook: Arc<PaymentWebhookHandler>,
    pub orders: Arc<dyn OrderStore>,
    pub ledger: Arc<dyn StockLedger>,
}

/// Wire every service against the Diesel adapters. Must run inside a tokio
/// runtime because the job scheduler captures the current handle.
pub fn build_engine(pool: DbPool, config: &EngineConfig) -> Engine {
    let orders: Arc<dyn OrderStore> = Arc::new(DieselOrderStore::new(pool.clone()));
    let ledger: Arc<dyn StockLedger> = Arc::new(DieselStockLedger::new(pool.clone()));

    let scheduler = Arc::new(TokioJobScheduler::new());

    let fulfillment = Arc::new(FulfillmentService::new(
        orders.clone(),
        scheduler.clone(),
        FulfillmentPolicy {
            payment_window: config.payment_window(),
            confirm_window: config.confirm_window(),
        },
    ));
    // The scheduler fires back into the fulfillment service.
    scheduler.bind_handler(fulfillment.clone());

    let checkout = Arc::new(CheckoutService::new(
        orders.clone(),
        ledger.clone(),
        Arc::new(DieselStoreDirectory::new(
            pool.clone(),
            config.default_store_id,
        )),
        Arc::new(FlatRateShipping::new(
            config.shipping_method_id,
            config.shipping_flat_cost.clone(),
        )),
        Arc::new(DieselCartGateway::new(pool.clone())),
        Arc::new(DieselCatalog::new(pool)),
        Arc::new(InMemoryIdempotencyStore::new()),
        scheduler,
        CheckoutPolicy {
            payment_window: config.payment_window(),
            idempotency_ttl: Duration::from_secs(config.idempotency_ttl_secs),
        },
    ));

    let webhook = Arc::new(PaymentWebhookHandler::new(
        orders.clone(),
        fulfillment.clone(),
        config.gateway_server_key.clone(),
    ));

    Engine {
        checkout,
        fulfillment,
        webhook,
        orders,
        ledger,
    }
}

// ── Server ───────────────────────────────────────────────────────────────────

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    engine: Engine,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(engine.clone()))
            .wrap(Logger::default())
            .route("/checkout", web::post().to(handlers::checkout::create_checkout))
            .service(
                web::scope("/orders")
                    .route("/{id}", web::get().to(handlers::orders::get_order))
                    .route(
                        "/{id}/payment-proof",
                        web::post().to(handlers::orders::submit_payment_proof),
                    )
                    .route(
                        "/{id}/confirm",
                        web::post().to(handlers::orders::confirm_receipt),
                    )
                    .route(
                        "/{id}/cancel",
                        web::post().to(handlers::orders::cancel_order),
                    ),
            )
            .service(
                web::scope("/admin")
                    .service(
                        web::scope("/orders")
                            .route(
                                "/{id}/approve",
                                web::post().to(handlers::admin::approve_payment),
                            )
                            .route(
                                "/{id}/reject",
                                web::post().to(handlers::admin::reject_payment),
                            )
                            .route("/{id}/ship", web::post().to(handlers::admin::ship_order))
                            .route(
                                "/{id}/cancel",
                                web::post().to(handlers::admin::cancel_order),
                            ),
                    )
                    .service(
                        web::scope("/inventory")
                            .route(
                                "/restore",
                                web::post().to(handlers::inventory::restore_stock),
                            )
                            .route(
                                "/transfer",
                                web::post().to(handlers::inventory::transfer_stock),
                            ),
                    ),
            )
            .route(
                "/inventory/availability",
                web::get().to(handlers::inventory::check_availability),
            )
            .route(
                "/payments/webhook",
                web::post().to(handlers::webhook::payment_webhook),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
