//! Prelude: re-exports the types and step factories most call sites need.
//!
//! # Usage
//! ```
//! use coro_rt::prelude::*;
//! ```

pub use crate::attributes::{AttributeKey, AttributeStore};
pub use crate::channel::{receive, send, Channel, ChannelId};
pub use crate::context::CoroutineContext;
pub use crate::continuation::{Continuation, State as ContinuationState};
pub use crate::coroutine::Coroutine;
pub use crate::error::{Error, Result};
pub use crate::executor::{Executor, TokioExecutor};
pub use crate::scope::{CoroutineScope, ScopeInner};
pub use crate::step::chain::FinishStep;
pub use crate::step::combinators::{
    apply, consume, do_if, do_if_else, for_each, for_each_collecting, run, supply, try_apply,
};
pub use crate::step::Step;
pub use crate::suspension::Suspension;
