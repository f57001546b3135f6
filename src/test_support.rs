use crate::config::Config;
use crate::context::CoordinationContext;
use crate::store::CoordinationStore;
use tempfile::TempDir;

/// A coordination domain rooted in a fresh temporary directory.
pub(crate) struct TestDomain {
    _temp_dir: TempDir,
    pub(crate) ctx: CoordinationContext,
    pub(crate) config: Config,
    pub(crate) store: CoordinationStore,
}

impl TestDomain {
    pub(crate) fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub(crate) fn with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let ctx = CoordinationContext::at(temp_dir.path().join(".baton"));
        ctx.ensure_dirs().unwrap();
        let store = CoordinationStore::new(ctx.clone(), &config);
        Self {
            _temp_dir: temp_dir,
            ctx,
            config,
            store,
        }
    }
}

/// Default config with a different global cap.
pub(crate) fn config_with_capacity(max_concurrent: u32) -> Config {
    Config {
        max_concurrent,
        ..Config::default()
    }
}
