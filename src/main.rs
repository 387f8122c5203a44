use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use anyhow::Context;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use meme_api::auth::TokenService;
use meme_api::config::Settings;
use meme_api::openapi::ApiDoc;
use meme_api::repo::Repo;
use meme_api::{config, AppState, Recoverer};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds; production sets the environment externally.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let settings = Settings::from_env().context("invalid configuration")?;
    info!(
        bind = %settings.bind_addr,
        issuer = %settings.auth.issuer,
        cookie_domain = %settings.auth.cookie_domain,
        "Bootstrapping meme api"
    );

    #[cfg(feature = "postgres-store")]
    let repo: Arc<dyn Repo> = {
        let pg = meme_api::repo::pg::PgRepo::connect_lazy(&settings.database_url, settings.db_max_connections)
            .context("failed to create Postgres pool")?;
        pg.migrate().await.context("failed to apply migrations")?;
        info!("Using Postgres repository backend");
        Arc::new(pg)
    };
    #[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
    let repo: Arc<dyn Repo> = {
        tracing::warn!("Using in-memory repository backend; DATABASE_URL is ignored");
        Arc::new(meme_api::repo::inmem::InMemRepo::new())
    };

    let state = web::Data::new(AppState { repo, tokens: TokenService::new(settings.auth.clone()) });
    let openapi = ApiDoc::openapi();
    let frontend_url = settings.frontend_url.clone();

    let server = HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(["Accept", "Content-Type", "X-CSRF-Token", "Authorization"])
            .supports_credentials()
            .max_age(3600);
        if let Some(front) = &frontend_url {
            cors = cors.allowed_origin(front);
        }

        App::new()
            .wrap(cors)
            .wrap(Compress::default())
            .wrap(TracingLogger::default())
            .wrap(Recoverer)
            .app_data(state.clone())
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind(&settings.bind_addr)
    .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    info!("Listening on http://{}", settings.bind_addr);

    server.run().await?;
    Ok(())
}
