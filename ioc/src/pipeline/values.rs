use super::BuilderStrategy;
use crate::context::{BuilderContext, Resolver};
use crate::error::{guard_user, RegistrationFault, ResolutionError};
use crate::registration::{HeldInstance, RegistrationData};

/// Invokes a registered factory.
#[derive(Debug, Default)]
pub struct FactoryStrategy;

impl BuilderStrategy for FactoryStrategy {
  fn pre_build_up(&self, ctx: &mut BuilderContext<'_>) {
    if ctx.result().is_some() {
      return;
    }
    let registration = ctx.registration.clone();
    let RegistrationData::Factory(factory) = &registration.data else {
      uninitialized(ctx);
      return;
    };
    let outcome = {
      let mut resolver = Resolver::new(ctx);
      guard_user(|| factory(&mut resolver))
    };
    match outcome {
      Ok(value) => ctx.set_result(value),
      Err(err) => {
        let err = ResolutionError::from_user(&ctx.contract, err);
        ctx.fail(err);
      }
    }
  }
}

/// Supplies a registered instance that its lifetime manager no longer holds.
#[derive(Debug, Default)]
pub struct InstanceStrategy;

impl BuilderStrategy for InstanceStrategy {
  fn pre_build_up(&self, ctx: &mut BuilderContext<'_>) {
    if ctx.result().is_some() {
      return;
    }
    let registration = ctx.registration.clone();
    match &registration.data {
      RegistrationData::Instance(HeldInstance::Strong(value)) => ctx.set_result(value.clone()),
      RegistrationData::Instance(HeldInstance::Weak(value)) => match value.upgrade() {
        Some(value) => ctx.set_result(value),
        None => ctx.fail(ResolutionError::InstanceReleased {
          contract: ctx.contract.clone(),
        }),
      },
      _ => uninitialized(ctx),
    }
  }
}

/// Seals the built object and re-types it as the requested contract.
#[derive(Debug, Default)]
pub struct CompleteStrategy;

impl BuilderStrategy for CompleteStrategy {
  fn pre_build_up(&self, ctx: &mut BuilderContext<'_>) {
    let target = ctx.contract.ty();
    if ctx.result().is_none() {
      if let Some(built) = ctx.existing.take() {
        match ctx.type_info.as_ref().and_then(|info| info.seal(built)) {
          Some(value) => ctx.set_result(value),
          None => {
            let contract = ctx.contract.clone();
            ctx.fail(ResolutionError::TypeMismatch {
              contract,
              expected: target.name(),
            });
            return;
          }
        }
      }
    }

    let Some(value) = ctx.result().cloned() else {
      let contract = ctx.contract.clone();
      ctx.fail(ResolutionError::NoResult { contract });
      return;
    };
    if value.type_key() == target {
      return;
    }
    match ctx.catalog().convert(&value, target) {
      Some(cast) => ctx.set_result(cast),
      None => {
        let contract = ctx.contract.clone();
        ctx.fail(ResolutionError::TypeMismatch {
          contract,
          expected: target.name(),
        });
      }
    }
  }
}

fn uninitialized(ctx: &mut BuilderContext<'_>) {
  let contract = ctx.contract.clone();
  ctx.fail(ResolutionError::Registration {
    contract,
    reason: RegistrationFault::Uninitialized,
  });
}
