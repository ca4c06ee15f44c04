use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;

use axum::{
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;

use vram_core::clock::now_ms;
use vram_core::config::CoordinatorConfig;
use vram_core::error::CoordinatorError;
use vram_core::infrastructure::RegistryStore;
use vram_core::infrastructure_in_memory::InMemoryRegistryStore;
use vram_core::infrastructure_json::JsonFileStore;
use vram_core::notifier::{dispatch, EvictionNotice, HttpNotifier, Notifier};
use vram_core::probe::{probe_or_default, CapacityProbe, NvidiaSmiProbe};
use vram_core::reclaimer::{IdleReclaimer, ReclaimReport};
use vram_core::registry::{Admission, CapacityStatus, Registry};
use vram_core::types::LeaseKey;

use crate::handlers::*;

/// Everything the handlers share. The registry is the single ledger; every
/// mutation holds its write lock for the whole decide-and-commit step.
pub struct Coordinator {
    registry: RwLock<Registry>,
    notifier: Arc<dyn Notifier>,
    probe: Arc<dyn CapacityProbe>,
    reclaimer: IdleReclaimer,
    fallback_capacity: u64,
}

pub type AppState = Arc<Coordinator>;

pub struct ServeOptions {
    pub host: String,
    pub port: u16,
    pub storage: String,
    pub max_concurrency: usize,
    pub config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(
        registry: Registry,
        notifier: Arc<dyn Notifier>,
        probe: Arc<dyn CapacityProbe>,
        reclaimer: IdleReclaimer,
        fallback_capacity: u64,
    ) -> Self {
        Self {
            registry: RwLock::new(registry),
            notifier,
            probe,
            reclaimer,
            fallback_capacity,
        }
    }

    /// Deliver notices off the request path. Never awaited.
    fn notify(&self, notices: Vec<EvictionNotice>) {
        if notices.is_empty() {
            return;
        }
        let notifier = Arc::clone(&self.notifier);
        tokio::task::spawn_blocking(move || dispatch(notifier.as_ref(), &notices));
    }

    async fn probe_total(&self) -> u64 {
        let probe = Arc::clone(&self.probe);
        let fallback = self.fallback_capacity;
        tokio::task::spawn_blocking(move || probe_or_default(probe.as_ref(), fallback))
            .await
            .unwrap_or(fallback)
    }

    /// Two-phase sweep: collect under the read lock, then evict one lease at
    /// a time under the write lock, re-checking idleness each time.
    async fn sweep(&self) -> ReclaimReport {
        let candidates = self.idle_candidates().await;
        self.reclaim_candidates(&candidates).await
    }

    async fn idle_candidates(&self) -> Vec<LeaseKey> {
        let registry = self.registry.read().await;
        self.reclaimer.candidates(&registry, now_ms())
    }

    async fn reclaim_candidates(&self, candidates: &[LeaseKey]) -> ReclaimReport {
        let mut report = ReclaimReport::default();
        for key in candidates {
            let mut registry = self.registry.write().await;
            self.reclaimer.reclaim(&mut registry, key, now_ms(), &mut report);
        }

        report.log();
        self.notify(report.notices.clone());
        report
    }
}

pub async fn run(opts: ServeOptions) {
    let config = opts.config;
    let probe: Arc<dyn CapacityProbe> = Arc::new(NvidiaSmiProbe::new());
    let fallback = config.fallback_capacity_mib;
    let total = {
        let probe = Arc::clone(&probe);
        tokio::task::spawn_blocking(move || probe_or_default(probe.as_ref(), fallback))
            .await
            .unwrap_or(fallback)
    };

    let store = create_store(&opts.storage);
    let (registry, notices) = Registry::open(config.capacity(total), store, now_ms());

    tracing::info!(
        total_mib = total,
        reserve_mib = config.reserve_mib,
        idle_timeout_s = config.idle_timeout.as_secs(),
        storage = %registry.store_description(),
        "📊 Capacity established"
    );

    let state: AppState = Arc::new(Coordinator::new(
        registry,
        Arc::new(HttpNotifier::new(config.notify_timeout)),
        probe,
        config.reclaimer(),
        fallback,
    ));
    state.notify(notices);

    tokio::spawn(reclaim_loop(Arc::clone(&state)));

    let app = router(state, opts.max_concurrency);

    let addr = format!("{}:{}", opts.host, opts.port);

    if std::env::var("VRAMD_API_KEY").is_ok() {
        tracing::info!("🔐 API key authentication enabled");
    } else {
        tracing::warn!("⚠️  No VRAMD_API_KEY set — server is open (dev mode)");
    }

    tracing::info!("🧮 VRAM coordinator starting on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Failed to bind {}", addr);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
    }
}

pub fn router(state: AppState, max_concurrency: usize) -> Router {
    Router::new()
        // Health is always open (no auth)
        .route("/health", get(health))
        // Protected routes
        .route("/register", post(register))
        .route("/allocate", post(allocate))
        .route("/touch", post(touch))
        .route("/release/{name}", post(release))
        .route("/release/{name}/{resource}", post(release_resource))
        .route("/status", get(status))
        .route("/reclaim", post(reclaim))
        .layer(middleware::from_fn(auth_middleware))
        .layer(ConcurrencyLimitLayer::new(max_concurrency.max(1)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn reclaim_loop(state: AppState) {
    let mut ticker = tokio::time::interval(state.reclaimer.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        state.sweep().await;
    }
}

// ─── Auth Middleware ────────────────────────────────────────────────────────

async fn auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let expected_key = match std::env::var("VRAMD_API_KEY") {
        Ok(key) if !key.is_empty() => key,
        _ => return Ok(next.run(request).await),
    };

    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth_header.strip_prefix("Bearer ").unwrap_or("");

    if token == expected_key {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("🚫 Unauthorized request to {}", request.uri().path());
        Err(StatusCode::UNAUTHORIZED)
    }
}

// ─── Handlers ───────────────────────────────────────────────────────────────

type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

fn bad_request<T: serde::Serialize>(msg: String) -> Reply<T> {
    (StatusCode::BAD_REQUEST, Json(ApiResponse::err(msg)))
}

fn failure<T: serde::Serialize>(e: CoordinatorError) -> Reply<T> {
    let code = match &e {
        CoordinatorError::CapacityExceeded { .. } => StatusCode::CONFLICT,
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, Json(ApiResponse::err(e.to_string())))
}

fn admitted(name: &str, admission: &Admission, registry: &Registry) -> AdmissionResponse {
    let used = registry.used();
    AdmissionResponse {
        name: name.to_string(),
        granted: admission.granted,
        freed: admission.freed,
        evicted: admission.evicted(),
        used,
        available: registry.capacity().limit().saturating_sub(used),
    }
}

async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let registry = state.registry.read().await;
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        loaded_leases: registry.loaded_lease_count(),
        used: registry.used(),
        total: registry.capacity().total,
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Reply<AdmissionResponse> {
    let priority = match req.validate() {
        Ok(p) => p,
        Err(e) => return bad_request(e),
    };

    let mut registry = state.registry.write().await;
    let result = registry.register(&req.name, &req.callback, req.leases, priority, now_ms());
    match result {
        Ok(admission) => {
            let body = admitted(&req.name, &admission, &registry);
            drop(registry);
            state.notify(admission.notices);
            (StatusCode::CREATED, Json(ApiResponse::ok(body)))
        }
        Err(e) => failure(e),
    }
}

async fn allocate(
    State(state): State<AppState>,
    Json(req): Json<AllocateRequest>,
) -> Reply<AdmissionResponse> {
    let priority = match req.validate() {
        Ok(p) => p,
        Err(e) => return bad_request(e),
    };

    let mut registry = state.registry.write().await;
    let result = registry.request_allocation(
        &req.name,
        req.amount,
        req.resource.as_deref(),
        priority,
        now_ms(),
    );
    match result {
        Ok(admission) => {
            let body = admitted(&req.name, &admission, &registry);
            drop(registry);
            state.notify(admission.notices);
            (StatusCode::OK, Json(ApiResponse::ok(body)))
        }
        Err(e) => failure(e),
    }
}

async fn touch(
    State(state): State<AppState>,
    Json(req): Json<TouchRequest>,
) -> Reply<TouchResponse> {
    let mut registry = state.registry.write().await;
    match registry.touch(&req.name, &req.resource, now_ms()) {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::ok(TouchResponse {
                name: req.name,
                resource: req.resource,
            })),
        ),
        Err(e) => failure(e),
    }
}

async fn release(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Reply<ReleaseResponse> {
    let mut registry = state.registry.write().await;
    match registry.release_explicit(&name) {
        Ok(freed) => (
            StatusCode::OK,
            Json(ApiResponse::ok(ReleaseResponse {
                name,
                resource: None,
                freed,
            })),
        ),
        Err(e) => failure(e),
    }
}

async fn release_resource(
    State(state): State<AppState>,
    Path((name, resource)): Path<(String, String)>,
) -> Reply<ReleaseResponse> {
    let mut registry = state.registry.write().await;
    match registry.release_resource(&name, &resource) {
        Ok(freed) => (
            StatusCode::OK,
            Json(ApiResponse::ok(ReleaseResponse {
                name,
                resource: Some(resource),
                freed,
            })),
        ),
        Err(e) => failure(e),
    }
}

async fn status(State(state): State<AppState>) -> Json<ApiResponse<CapacityStatus>> {
    let total = state.probe_total().await;
    let notices = state.registry.write().await.set_total_capacity(total);
    state.notify(notices);

    let registry = state.registry.read().await;
    Json(ApiResponse::ok(registry.snapshot(now_ms())))
}

async fn reclaim(State(state): State<AppState>) -> Json<ApiResponse<ReclaimReport>> {
    let report = state.sweep().await;
    Json(ApiResponse::ok(report))
}

// ─── Storage Backend Selection ──────────────────────────────────────────────

fn create_store(storage: &str) -> Box<dyn RegistryStore + Send + Sync> {
    if storage == "memory" {
        tracing::info!("💾 Storage backend: in-memory (registry will not persist)");
        Box::new(InMemoryRegistryStore::new())
    } else if let Some(path) = storage.strip_prefix("json:") {
        tracing::info!("💾 Storage backend: JSON file ({})", path);
        Box::new(JsonFileStore::new(path))
    } else if let Some(path) = storage.strip_prefix("sqlite:") {
        #[cfg(feature = "sqlite")]
        {
            tracing::info!("💾 Storage backend: SQLite ({})", path);
            match vram_core::infrastructure_sqlite::SqliteRegistryStore::open(path) {
                Ok(store) => Box::new(store),
                Err(e) => {
                    tracing::error!("Failed to open SQLite: {}. Falling back to in-memory.", e);
                    Box::new(InMemoryRegistryStore::new())
                }
            }
        }
        #[cfg(not(feature = "sqlite"))]
        {
            tracing::error!(
                "SQLite storage requested but `sqlite` feature is not enabled. \
                 Rebuild with: cargo build --features sqlite"
            );
            tracing::warn!("Falling back to in-memory storage.");
            let _ = path;
            Box::new(InMemoryRegistryStore::new())
        }
    } else {
        tracing::error!(
            "Unknown storage backend: '{}'. Use 'memory', 'json:<path>' or 'sqlite:<path>'",
            storage
        );
        tracing::warn!("Falling back to in-memory storage.");
        Box::new(InMemoryRegistryStore::new())
    }
}
