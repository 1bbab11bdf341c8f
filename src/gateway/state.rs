use std::sync::Arc;

use sqlx::PgPool;

use crate::ratelimit::RateLimiter;
use crate::service::FaceService;
use crate::tenant::TenantResolver;
use crate::widget::WidgetService;

/// Shared handler state; cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub faces: Arc<FaceService>,

    pub widget: Arc<WidgetService>,

    pub resolver: Arc<TenantResolver>,

    pub limiter: Arc<dyn RateLimiter>,

    /// Pool handle for readiness probing; absent in mock-backed tests.
    pub db: Option<PgPool>,
}

impl AppState {
    pub fn new(
        faces: Arc<FaceService>,
        widget: Arc<WidgetService>,
        resolver: Arc<TenantResolver>,
        limiter: Arc<dyn RateLimiter>,
        db: Option<PgPool>,
    ) -> Self {
        Self {
            faces,
            widget,
            resolver,
            limiter,
            db,
        }
    }
}
