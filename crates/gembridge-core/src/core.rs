use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use gembridge_transform::Settings;
use gembridge_transform::native_tools::NativeToolsManager;

use crate::handler::{chat_completions_handler, health_handler, not_found_handler};
use crate::upstream::Upstream;

pub struct CoreState {
    pub upstream: Arc<dyn Upstream>,
    pub settings: Settings,
    pub tools: NativeToolsManager,
}

pub struct Core {
    state: Arc<CoreState>,
}

impl Core {
    pub fn new(upstream: Arc<dyn Upstream>, settings: Settings) -> Self {
        let tools = NativeToolsManager::new(settings.clone());
        Self {
            state: Arc::new(CoreState {
                upstream,
                settings,
                tools,
            }),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/v1/chat/completions", post(chat_completions_handler))
            .route("/health", get(health_handler))
            .fallback(not_found_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    pub fn state(&self) -> Arc<CoreState> {
        self.state.clone()
    }
}
