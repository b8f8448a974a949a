use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod adapters;
mod auth;
mod config;
mod models;
mod routes;

use adapters::{GeminiReasoner, OpenAiEmbedding, PgDurableMemoryStore, QdrantSemanticIndex};
use config::ServerConfig;
use kairo::adapters::InMemoryRecentStore;
use kairo::{AgentComponents, AgentConfig, AgentContext, EmbeddingService, SemanticIndex};

/// Application state shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<AgentContext>,
    /// Bearer token for protected routes; `None` disables auth
    pub api_key: Option<String>,
}

#[derive(Serialize)]
struct HealthCheck {
    status: String,
    message: String,
    version: String,
}

async fn health_check() -> Json<HealthCheck> {
    Json(HealthCheck {
        status: "ok".to_string(),
        message: "Kairo API is running - the loop keeps turning".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Router with every route, auth and the OpenAPI docs
fn build_router(state: AppState) -> Router {
    // Protected routes (require authentication)
    let protected_routes = Router::new()
        .merge(routes::agent::router())
        .merge(routes::memory::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    let openapi = routes::swagger::ApiDoc::openapi();

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .route("/health", get(health_check))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Qdrant needs an embedder; either missing or unreachable disables semantic retrieval
async fn connect_semantic_index(server: &ServerConfig) -> Option<Arc<dyn SemanticIndex>> {
    let Some(url) = server.qdrant_url.as_deref() else {
        tracing::warn!("⚠️  No QDRANT_URL set - semantic retrieval disabled");
        return None;
    };
    let Some(openai_key) = server.openai_api_key.clone() else {
        tracing::warn!("⚠️  No OPENAI_API_KEY set - semantic retrieval disabled");
        return None;
    };

    let embedding: Arc<dyn EmbeddingService> =
        Arc::new(OpenAiEmbedding::new(openai_key, server.embedding_dimensions));
    tracing::info!(
        "🧬 Embedding service initialized ({} dimensions)",
        server.embedding_dimensions
    );

    let index = match QdrantSemanticIndex::new(
        url,
        server.qdrant_api_key.clone(),
        server.collection_prefix.clone(),
        embedding,
    ) {
        Ok(index) => index,
        Err(e) => {
            tracing::warn!("⚠️  Failed to connect to Qdrant: {}", e);
            return None;
        }
    };

    if let Err(e) = index.ensure_collections().await {
        tracing::warn!("⚠️  Failed to prepare Qdrant collections: {}", e);
        return None;
    }

    Some(Arc::new(index))
}

#[shuttle_runtime::main]
async fn main(
    #[shuttle_shared_db::Postgres] pool: PgPool,
    #[shuttle_runtime::Secrets] secrets: shuttle_runtime::SecretStore,
) -> shuttle_axum::ShuttleAxum {
    tracing::info!("🧠 Kairo API initializing...");

    let server = ServerConfig::from_lookup(|key| secrets.get(key));
    let agent_config = AgentConfig::from_lookup(|key| secrets.get(key));

    if server.api_key.is_some() {
        tracing::info!("🔐 API key authentication enabled");
    } else {
        tracing::warn!("⚠️  No KAIRO_API_KEY set - authentication disabled");
    }

    // Run migrations
    sqlx::migrate!()
        .run(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run database migrations: {}", e))?;

    tracing::info!("✅ Database migrations completed");

    let gemini_key = server
        .gemini_api_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY is required for reasoning"))?;
    let mut reasoner = GeminiReasoner::new(gemini_key);
    if let Some(model) = &server.gemini_model {
        reasoner = reasoner.with_model(model.clone());
    }
    tracing::info!("🔮 Reasoning provider initialized (Gemini)");

    let components = AgentComponents {
        recent: Arc::new(InMemoryRecentStore::new(&agent_config.recent)),
        durable: Arc::new(PgDurableMemoryStore::new(pool)),
        semantic: connect_semantic_index(&server).await,
        reasoning: Arc::new(reasoner),
    };

    let agent = Arc::new(AgentContext::build(agent_config, components));

    if server.autostart {
        agent
            .start()
            .map_err(|e| anyhow::anyhow!("Failed to start control loop: {}", e))?;
    } else {
        tracing::warn!("⚠️  LOOP_AUTOSTART disabled - control loop idle");
    }

    {
        let agent = agent.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                agent.shutdown().await;
            }
        });
    }

    let router = build_router(AppState {
        agent,
        api_key: server.api_key,
    });

    tracing::info!("📚 Swagger UI: /swagger-ui");
    tracing::info!("✅ Kairo API ready");

    Ok(router.into())
}
