//! The per-iteration [`Context`]: the bundle of external transaction handles and the
//! client-defined payload that handlers and `run` callbacks are given for the duration
//! of one iteration.

use std::any::Any;

use rustc_hash::FxHashMap;

use crate::Engine;

/// An immutable, process-wide snapshot set by the driver before each iteration.
///
/// A transaction handle that is absent from the context (never inserted by the
/// [`ContextBuilder`]) models "this handle is null this iteration" structurally: a
/// lookup simply returns `None` rather than requiring callers to dereference a raw
/// pointer and hope it isn't null.
#[derive(Default)]
pub struct Context {
    handles: FxHashMap<String, Box<dyn Any>>,
    client_data: Option<Box<dyn Any>>,
}

impl Context {
    /// Returns the transaction handle registered under `name`, if any, downcast to `T`.
    ///
    /// Returns `None` both when no handle was ever registered under this name and when
    /// one was registered with a different type — callers that need to tell those apart
    /// should use a naming convention that encodes the expected type.
    pub fn handle<T: 'static>(&self, name: &str) -> Option<&T> {
        self.handles.get(name).and_then(|b| b.downcast_ref())
    }

    /// Returns the opaque client payload, if one was set, downcast to `T`.
    pub fn client_data<T: 'static>(&self) -> Option<&T> {
        self.client_data.as_deref().and_then(|b| b.downcast_ref())
    }
}

/// Builds a [`Context`] for one iteration.
///
/// ```
/// # use increngine::ContextBuilder;
/// let ctx = ContextBuilder::new()
///     .with_handle("routes_db", 42i32)
///     .with_client_data("iteration-7")
///     .build();
/// assert_eq!(ctx.handle::<i32>("routes_db"), Some(&42));
/// assert_eq!(ctx.client_data::<&str>(), Some(&"iteration-7"));
/// ```
#[derive(Default)]
pub struct ContextBuilder {
    handles: FxHashMap<String, Box<dyn Any>>,
    client_data: Option<Box<dyn Any>>,
}

impl ContextBuilder {
    /// Starts an empty builder (every handle absent, no client payload).
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transaction handle under `name`. Calling this is what makes a later
    /// `Context::handle` lookup for that name return `Some`; omitting it is how an
    /// iteration models that handle being null.
    pub fn with_handle<T: 'static>(mut self, name: impl Into<String>, handle: T) -> Self {
        self.handles.insert(name.into(), Box::new(handle));
        self
    }

    /// Sets the opaque client-defined payload carried alongside the transaction handles.
    pub fn with_client_data<T: 'static>(mut self, data: T) -> Self {
        self.client_data = Some(Box::new(data));
        self
    }

    /// Finishes the builder, producing an immutable [`Context`].
    pub fn build(self) -> Context {
        Context {
            handles: self.handles,
            client_data: self.client_data,
        }
    }
}

impl Engine {
    /// Installs the [`Context`] for the upcoming iteration. A handler that needs a
    /// transaction handle absent from this context must return `UNHANDLED` rather than
    /// proceed — see the per-input dispatch contract.
    pub fn set_context(&mut self, context: Context) {
        self.context = Some(context);
    }

    /// Returns the currently installed context, if one has been set.
    ///
    /// `run` is only ever invoked with a context already installed (the recompute gate
    /// refuses a call that would otherwise need one and doesn't have it), so a `run`
    /// callback may treat a `None` here as a construction error in its own test setup
    /// rather than a real runtime case.
    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }
}
