use super::{BuilderStrategy, ChainKind, PipelineMode, Stage};
use crate::context::BuilderContext;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type BuildDelegate = Box<dyn for<'c, 'a> Fn(&'c mut BuilderContext<'a>) + Send + Sync>;

fn delegate<F>(f: F) -> BuildDelegate
where
  F: for<'c, 'a> Fn(&'c mut BuilderContext<'a>) + Send + Sync + 'static,
{
  Box::new(f)
}

struct Stages {
  version: u64,
  buckets: Vec<Vec<Arc<dyn BuilderStrategy>>>,
}

/// The flattened strategy list for one chain version. Executing builds hold
/// their own snapshot, so changes to the chain never affect a running build.
struct Snapshot {
  version: u64,
  strategies: Vec<Arc<dyn BuilderStrategy>>,
  compiled: OnceCell<BuildDelegate>,
}

/// An ordered set of stages, each holding strategies in insertion order.
///
/// Every change bumps the chain's version. The flattened list, and the
/// composed closure used in [`PipelineMode::Compiled`], are rebuilt lazily on
/// the next build that observes a new version.
pub struct StagedStrategyChain {
  kind: ChainKind,
  stages: RwLock<Stages>,
  snapshot: RwLock<Option<Arc<Snapshot>>>,
}

impl StagedStrategyChain {
  pub fn new(kind: ChainKind) -> Self {
    Self {
      kind,
      stages: RwLock::new(Stages {
        version: 0,
        buckets: vec![Vec::new(); Stage::ALL.len()],
      }),
      snapshot: RwLock::new(None),
    }
  }

  pub fn kind(&self) -> ChainKind {
    self.kind
  }

  pub fn version(&self) -> u64 {
    self.stages.read().version
  }

  /// Appends `strategy` to `stage`.
  pub fn add(&self, stage: Stage, strategy: Arc<dyn BuilderStrategy>) {
    let mut stages = self.stages.write();
    stages.buckets[stage.index()].push(strategy);
    stages.version += 1;
  }

  /// Removes `strategy` from whichever stage holds it. Returns `false` if the
  /// chain did not contain it.
  pub fn remove(&self, strategy: &Arc<dyn BuilderStrategy>) -> bool {
    let target = Arc::as_ptr(strategy) as *const ();
    let mut stages = self.stages.write();
    let mut removed = false;
    for bucket in stages.buckets.iter_mut() {
      let before = bucket.len();
      bucket.retain(|s| Arc::as_ptr(s) as *const () != target);
      removed |= bucket.len() != before;
    }
    if removed {
      stages.version += 1;
    }
    removed
  }

  /// The strategies of one stage, in order.
  pub fn stage(&self, stage: Stage) -> Vec<Arc<dyn BuilderStrategy>> {
    self.stages.read().buckets[stage.index()].clone()
  }

  /// Every strategy in execution order.
  pub fn strategies(&self) -> Vec<Arc<dyn BuilderStrategy>> {
    self.current().strategies.clone()
  }

  pub fn len(&self) -> usize {
    self.stages.read().buckets.iter().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn current(&self) -> Arc<Snapshot> {
    let version = self.version();
    if let Some(snapshot) = self.snapshot.read().as_ref() {
      if snapshot.version == version {
        return snapshot.clone();
      }
    }
    let snapshot = {
      let stages = self.stages.read();
      Arc::new(Snapshot {
        version: stages.version,
        strategies: stages.buckets.iter().flatten().cloned().collect(),
        compiled: OnceCell::new(),
      })
    };
    debug!(
      chain = ?self.kind,
      version = snapshot.version,
      strategies = snapshot.strategies.len(),
      "rebuilt strategy chain"
    );
    *self.snapshot.write() = Some(snapshot.clone());
    snapshot
  }

  /// Runs the chain against `ctx`.
  pub(crate) fn execute(&self, ctx: &mut BuilderContext<'_>, mode: PipelineMode) {
    let snapshot = self.current();
    match mode {
      PipelineMode::Interpreted => run_interpreted(&snapshot.strategies, ctx),
      PipelineMode::Compiled => {
        let compiled = snapshot
          .compiled
          .get_or_init(|| compile(&snapshot.strategies));
        compiled(ctx);
      }
    }
  }
}

fn run_interpreted(strategies: &[Arc<dyn BuilderStrategy>], ctx: &mut BuilderContext<'_>) {
  let mut entered = 0;
  for strategy in strategies {
    if ctx.is_halted() {
      break;
    }
    strategy.pre_build_up(ctx);
    entered += 1;
  }
  for strategy in strategies[..entered].iter().rev() {
    strategy.post_build_up(ctx);
  }
}

/// Nests the strategies into one closure: each strategy wraps the rest of the chain.
fn compile(strategies: &[Arc<dyn BuilderStrategy>]) -> BuildDelegate {
  let mut next = delegate(|_ctx| {});
  for strategy in strategies.iter().rev() {
    let strategy = strategy.clone();
    let inner = next;
    next = delegate(move |ctx| {
      if ctx.is_halted() {
        return;
      }
      strategy.pre_build_up(ctx);
      inner(&mut *ctx);
      strategy.post_build_up(ctx);
    });
  }
  next
}

impl fmt::Debug for StagedStrategyChain {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let stages = self.stages.read();
    let mut list = f.debug_map();
    for stage in Stage::ALL {
      let bucket = &stages.buckets[stage.index()];
      if !bucket.is_empty() {
        let names: Vec<_> = bucket.iter().map(|s| s.name()).collect();
        list.entry(&stage, &names);
      }
    }
    list.finish()
  }
}
