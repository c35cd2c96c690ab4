use dotenvy::dotenv;
use grocery_engine::{build_engine, build_server, create_pool, run_migrations, EngineConfig};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = EngineConfig::from_env();

    let pool = create_pool(&config.database_url);
    run_migrations(&pool);

    let engine = build_engine(pool, &config);

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    build_server(engine, &config.host, config.port)?.await
}
