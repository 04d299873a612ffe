//! Testing utilities.
//!
//! - [`Recorder`]: a thread-safe ordered log of strings, for asserting hook
//!   and original-implementation ordering
//! - [`CallCounter`]: a shared invocation counter
//! - [`widget_fixture`]: a runtime with a `Widget` class exposing one
//!   operation per supported argument shape

use graft_core::{Class, Imp, OpId, Runtime, Value};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A thread-safe, ordered log of strings. Clones share the same log.
#[derive(Clone, Default)]
pub struct Recorder {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// A copy of the entries recorded so far, in order.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Number of entries recorded so far.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Discard all entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// A shared invocation counter. Clones share the same count.
#[derive(Clone, Default)]
pub struct CallCounter {
    count: Arc<AtomicUsize>,
}

impl CallCounter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one.
    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Current count.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// Shorthand for building an [`OpId`].
pub fn op(name: &str) -> OpId {
    OpId::new(name)
}

/// Define the standard `Widget` test class on `runtime`.
///
/// One operation per supported shape, each logging its invocation to
/// `recorder`, plus a `count` getter (present precisely because getters are
/// not hookable):
///
/// - `tick` (zero-argument)
/// - `set_count` (int)
/// - `resize` (size)
/// - `set_frame` (rect)
/// - `set_peer` (object)
/// - `count` (getter, returns 7)
pub fn widget_class(runtime: &Runtime, recorder: &Recorder) -> Arc<Class> {
    let class = runtime
        .define_class("Widget", None)
        .expect("Widget class defined once per runtime");
    {
        let recorder = recorder.clone();
        class.define_method(
            "tick".into(),
            Imp::NoArg(Arc::new(move |_| recorder.push("tick"))),
        );
    }
    {
        let recorder = recorder.clone();
        class.define_method(
            "set_count".into(),
            Imp::Int(Arc::new(move |_, value| {
                recorder.push(format!("set_count({value})"));
            })),
        );
    }
    {
        let recorder = recorder.clone();
        class.define_method(
            "resize".into(),
            Imp::Size(Arc::new(move |_, size| {
                recorder.push(format!("resize({}x{})", size.width, size.height));
            })),
        );
    }
    {
        let recorder = recorder.clone();
        class.define_method(
            "set_frame".into(),
            Imp::Rect(Arc::new(move |_, rect| {
                recorder.push(format!(
                    "set_frame({},{} {}x{})",
                    rect.x, rect.y, rect.width, rect.height
                ));
            })),
        );
    }
    {
        let recorder = recorder.clone();
        class.define_method(
            "set_peer".into(),
            Imp::Obj(Arc::new(move |_, peer| {
                recorder.push(format!("set_peer(#{})", peer.id()));
            })),
        );
    }
    class.define_method("count".into(), Imp::Getter(Arc::new(|_| Value::Int(7))));
    class
}

/// A fresh runtime with the standard `Widget` class and its recorder.
pub fn widget_fixture() -> (Runtime, Arc<Class>, Recorder) {
    let runtime = Runtime::new();
    let recorder = Recorder::new();
    let class = widget_class(&runtime, &recorder);
    (runtime, class, recorder)
}
