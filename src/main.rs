use actix_web::{App, HttpResponse, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use campus_ledger::{
    config::Config,
    database::{create_pool, run_migrations},
    external::{LogNotifier, MockPaymentGateway, Notifier},
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml().expect("Failed to load configuration file");

    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let jwt_service = JwtService::new(&config.jwt.secret, config.jwt.access_token_expires_in);

    // swap for real push/email and card processors in deployment
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let gateway = MockPaymentGateway::approving().shared();

    let ledger = LedgerService::new(pool.clone(), config.wallet.currency.clone());
    let wallet_service = WalletService::new(ledger.clone(), gateway, config.wallet.clone());
    let event_service = EventService::new(
        pool.clone(),
        ledger.clone(),
        notifier.clone(),
        config.events.checkin_lead_minutes,
    );
    let meal_service = MealService::new(pool.clone(), ledger.clone());
    let reservation_service = ReservationService::new(pool.clone(), notifier);

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .wrap(create_cors())
            .app_data(web::Data::new(ledger.clone()))
            .app_data(web::Data::new(wallet_service.clone()))
            .app_data(web::Data::new(event_service.clone()))
            .app_data(web::Data::new(meal_service.clone()))
            .app_data(web::Data::new(reservation_service.clone()))
            .configure(swagger_config)
            .route("/health", web::get().to(|| async { HttpResponse::Ok().body("ok") }))
            .service(
                web::scope("/api/v1")
                    .configure(handlers::wallet_config)
                    .configure(handlers::event_config)
                    .configure(handlers::meal_config)
                    .configure(handlers::reservation_config)
                    .configure(handlers::classroom_config)
                    .configure(handlers::admin_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
