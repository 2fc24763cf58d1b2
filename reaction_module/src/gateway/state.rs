use std::sync::Arc;
use std::time::Instant;

use crate::pipeline::ReactionPipeline;

#[derive(Clone)]
pub struct GatewayState {
    pub pipeline: Arc<ReactionPipeline>,
    pub signing_secret: Option<String>,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(pipeline: Arc<ReactionPipeline>, signing_secret: Option<String>) -> Self {
        Self {
            pipeline,
            signing_secret,
            started_at: Instant::now(),
        }
    }
}
