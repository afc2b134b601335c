use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::RecommendationParameters,
    services::{Engine, EngineFactory},
};

/// The single engine the server talks to
pub enum EngineSlot {
    Ready(Engine),
    /// Holds the reason the last build failed
    Unavailable(String),
}

impl EngineSlot {
    pub fn engine(&self) -> AppResult<&Engine> {
        match self {
            EngineSlot::Ready(engine) => Ok(engine),
            EngineSlot::Unavailable(reason) => Err(AppError::EngineUnavailable(reason.clone())),
        }
    }

    pub fn engine_mut(&mut self) -> AppResult<&mut Engine> {
        match self {
            EngineSlot::Ready(engine) => Ok(engine),
            EngineSlot::Unavailable(reason) => Err(AppError::EngineUnavailable(reason.clone())),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub slot: Arc<RwLock<EngineSlot>>,
    pub factory: Arc<EngineFactory>,
    /// Used while no engine is running
    pub defaults: RecommendationParameters,
    /// Set by prefetches, cleared when the host reads it
    pub redraw_pending: Arc<AtomicBool>,
}

impl AppState {
    /// Builds the first engine
    ///
    /// A graph with too few eligible videos leaves the slot unavailable
    /// instead of failing startup; any other error is returned.
    pub async fn initialize(
        factory: EngineFactory,
        defaults: RecommendationParameters,
    ) -> AppResult<Self> {
        let redraw_pending = Arc::new(AtomicBool::new(false));
        let slot = match factory.build(defaults.clone()).await {
            Ok(engine) => EngineSlot::Ready(Self::attach_redraw(engine, &redraw_pending)),
            Err(e @ AppError::EmptyGraph { .. }) => {
                tracing::warn!(error = %e, "Starting without a recommendation engine");
                EngineSlot::Unavailable(e.to_string())
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            slot: Arc::new(RwLock::new(slot)),
            factory: Arc::new(factory),
            defaults,
            redraw_pending,
        })
    }

    /// Replaces the running engine with a freshly built one
    ///
    /// The build happens outside the lock; the swap itself is a single write.
    pub async fn refresh(&self, params: RecommendationParameters) -> AppResult<String> {
        match self.factory.build(params).await {
            Ok(engine) => {
                let engine = Self::attach_redraw(engine, &self.redraw_pending);
                let branch = engine.current_branch_label();
                *self.slot.write().await = EngineSlot::Ready(engine);
                self.redraw_pending.store(false, Ordering::SeqCst);
                tracing::info!("Recommendation engine refreshed");
                Ok(branch)
            }
            Err(e @ AppError::EmptyGraph { .. }) => {
                tracing::warn!(error = %e, "Refresh left no recommendation engine");
                *self.slot.write().await = EngineSlot::Unavailable(e.to_string());
                Err(e)
            }
            Err(e) => {
                tracing::error!(error = %e, "Refresh failed, keeping the current engine");
                Err(e)
            }
        }
    }

    /// Reads and clears the pending redraw flag
    pub fn take_redraw(&self) -> bool {
        self.redraw_pending.swap(false, Ordering::SeqCst)
    }

    fn attach_redraw(mut engine: Engine, pending: &Arc<AtomicBool>) -> Engine {
        let pending = pending.clone();
        engine.set_redraw_callback(Arc::new(move || {
            pending.store(true, Ordering::SeqCst);
        }));
        engine
    }
}
