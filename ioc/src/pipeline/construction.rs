use super::BuilderStrategy;
use crate::context::BuilderContext;
use crate::error::{guard_user, RegistrationFault, ResolutionError};
use crate::metadata::{Args, TypeKind};
use crate::select::select_constructor;

/// Selects a constructor, resolves its parameters and invokes it.
#[derive(Debug, Default)]
pub struct ConstructorStrategy;

impl BuilderStrategy for ConstructorStrategy {
  fn pre_build_up(&self, ctx: &mut BuilderContext<'_>) {
    if ctx.existing.is_some() || ctx.result().is_some() {
      return;
    }
    let contract = ctx.contract.clone();
    let Some(info) = ctx.type_info.clone() else {
      ctx.fail(ResolutionError::Registration {
        contract,
        reason: RegistrationFault::Uninitialized,
      });
      return;
    };
    if info.kind() != TypeKind::Concrete {
      ctx.fail(ResolutionError::Registration {
        contract,
        reason: RegistrationFault::NotConstructible(info.key().name()),
      });
      return;
    }

    let registration = ctx.registration.clone();
    let injected = registration.members().constructor();
    let index = match select_constructor(&info, injected, &*ctx) {
      Ok(index) => index,
      Err(reason) => {
        ctx.fail(ResolutionError::Registration { contract, reason });
        return;
      }
    };
    let ctor = &info.constructors()[index];

    let mut values = Vec::with_capacity(ctor.params().len());
    for (position, param) in ctor.params().iter().enumerate() {
      let explicit = injected.and_then(|args| args.get(position));
      match ctx.resolve_parameter(info.key(), param, explicit) {
        Ok(value) => values.push((param.name(), value)),
        Err(err) => {
          ctx.fail(err.at_site(&contract, format!("parameter `{}`", param.name())));
          return;
        }
      }
    }

    let invoke = ctor.invoke.clone();
    match guard_user(|| invoke(Args::new(values))) {
      Ok(built) => ctx.existing = Some(built),
      Err(err) => ctx.fail(ResolutionError::from_user(&contract, err)),
    }
  }
}
