use crate::rate_limit::RateLimiter;
use engine::Engine;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            rate_limiter: Arc::new(RateLimiter::new()),
        }
    }
}
