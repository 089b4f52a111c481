//! # coro-rt
//!
//! A cooperative coroutine runtime: typed suspendable [`Step`]s composed into
//! [`Coroutine`] chains, bounded [`Channel`]s for rendezvous between them, and
//! [`CoroutineScope`] for structured concurrency — launch a group of coroutines, wait
//! for all of them, or cancel the whole group together.
//!
//! A coroutine is built by chaining steps:
//!
//! ```no_run
//! use coro_rt::prelude::*;
//!
//! # async fn demo() -> Result<()> {
//! let executor = TokioExecutor::current();
//! let coroutine = Coroutine::first(apply(|s: String| s.to_uppercase()))
//!     .then(apply(|s: String| format!("{s}!")));
//! let shout = coroutine.run_blocking("hello".to_string(), executor)?;
//! assert_eq!(shout, "HELLO!");
//! # Ok(())
//! # }
//! ```
//!
//! and run standalone, or launched into a scope alongside others:
//!
//! ```no_run
//! use std::sync::Arc;
//! use coro_rt::prelude::*;
//!
//! # async fn demo() -> Result<()> {
//! let executor = TokioExecutor::current();
//! let context = CoroutineContext::new(executor);
//! let scope = CoroutineScope::new(context);
//!
//! let coroutine = Arc::new(Coroutine::first(apply(|x: i32| x + 1)));
//! let a = scope.spawn(Arc::clone(&coroutine), 1);
//! let b = scope.spawn(coroutine, 41);
//! scope.join().await;
//! assert_eq!(a.get_result().await?, 2);
//! assert_eq!(b.get_result().await?, 42);
//! # Ok(())
//! # }
//! ```

pub mod attributes;
pub mod channel;
pub mod context;
pub mod continuation;
pub mod coroutine;
pub mod error;
pub mod executor;
pub mod logging;
pub mod prelude;
pub mod scope;
pub mod step;
pub mod suspension;

pub use channel::{Channel, ChannelId};
pub use context::CoroutineContext;
pub use continuation::{Continuation, State as ContinuationState};
pub use coroutine::Coroutine;
pub use error::{Error, Result};
pub use executor::{Executor, TokioExecutor};
pub use scope::{CoroutineScope, ScopeInner};
pub use step::Step;
pub use suspension::Suspension;
