use graft::testing::{Recorder, widget_fixture};
use graft::{Class, Engine, ObjRef, Runtime};
use std::sync::Arc;

pub struct Setup {
    pub runtime: Runtime,
    pub engine: Engine,
    pub class: Arc<Class>,
    pub recorder: Recorder,
}

impl Setup {
    /// A fresh instance of the standard `Widget` class.
    pub fn widget(&self) -> ObjRef {
        self.runtime.instantiate(&self.class)
    }
}

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn setup() -> Setup {
    init_tracing();
    let (runtime, class, recorder) = widget_fixture();
    let engine = Engine::new(runtime.clone());
    Setup {
        runtime,
        engine,
        class,
        recorder,
    }
}
