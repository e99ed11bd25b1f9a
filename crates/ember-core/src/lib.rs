// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use thiserror::Error;
use tracing::info;

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}

/// Engine startup/shutdown stages, in the only order they may occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Stage {
    #[default]
    Uninitialized,
    WindowReady,
    GraphicsReady,
    Running,
    ShuttingDown,
    Destroyed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("lifecycle cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: Stage, to: Stage },
    #[error("lifecycle is destroyed; no further transitions")]
    Terminal,
}

/// Forward-only stage tracker. Skipping ahead is allowed, going back is not,
/// and `Destroyed` is terminal.
#[derive(Debug, Default)]
pub struct Lifecycle {
    stage: Stage,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn advance(&mut self, to: Stage) -> Result<(), LifecycleError> {
        if self.stage == Stage::Destroyed {
            return Err(LifecycleError::Terminal);
        }
        if to <= self.stage {
            return Err(LifecycleError::InvalidTransition {
                from: self.stage,
                to,
            });
        }
        info!("lifecycle {:?} -> {:?}", self.stage, to);
        self.stage = to;
        Ok(())
    }
}
