use super::BuilderStrategy;
use crate::context::BuilderContext;
use crate::error::ResolutionError;

/// Consults the lifetime manager before anything is built, and offers it the
/// result afterwards.
///
/// For single-flight policies the manager's build lock is taken after a first
/// cache miss and held until the post step, with the cache re-checked once the
/// lock is acquired.
#[derive(Debug, Default)]
pub struct LifetimeStrategy;

impl BuilderStrategy for LifetimeStrategy {
  fn pre_build_up(&self, ctx: &mut BuilderContext<'_>) {
    if let Some(value) = ctx.lifetime.try_get_value(&ctx.state.cache) {
      ctx.complete_with_cached(value);
      return;
    }
    if let Some(lock) = ctx.lifetime.build_lock() {
      let guard = lock.lock_arc();
      if let Some(value) = ctx.lifetime.try_get_value(&ctx.state.cache) {
        drop(guard);
        ctx.complete_with_cached(value);
        return;
      }
      ctx.build_guard = Some(guard);
    }
    if ctx.scope.is_disposed() || ctx.lifetime_owner.is_disposed() {
      ctx.fail(ResolutionError::ScopeDisposed {
        contract: ctx.contract.clone(),
      });
    }
  }

  fn post_build_up(&self, ctx: &mut BuilderContext<'_>) {
    if !ctx.is_faulted() && !ctx.is_cached() {
      if let Some(value) = ctx.result().cloned() {
        let first = ctx.lifetime.set_value(value, &mut ctx.state.cache);
        if first && ctx.lifetime.is_owned() {
          ctx.lifetime_owner.track(ctx.lifetime.clone());
        }
      }
    }
    ctx.build_guard = None;
  }
}
