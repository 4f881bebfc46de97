//! Layered resource cleanup.
//!
//! Setup builds a [`Teardown`] incrementally: every stage that acquires a
//! resource pushes a release action. Running the composite consumes it, so a
//! teardown executes at most once, and actions run in reverse push order
//! (last acquired, first released).

type Action = Box<dyn FnOnce() + Send>;

/// An ordered list of independent cleanup actions.
#[derive(Default)]
pub struct Teardown {
    actions: Vec<Action>,
}

impl Teardown {
    /// A teardown with nothing to release. Safe to run at any point.
    pub fn noop() -> Self {
        Self::default()
    }

    /// A teardown holding a single action.
    pub fn defer(action: impl FnOnce() + Send + 'static) -> Self {
        let mut td = Self::noop();
        td.push(action);
        td
    }

    /// Registers `action` to run before every action already registered.
    pub fn push(&mut self, action: impl FnOnce() + Send + 'static) {
        self.actions.push(Box::new(action));
    }

    /// Absorbs all actions of `other`, scheduled before this teardown's own.
    pub fn extend(&mut self, other: Teardown) {
        self.actions.extend(other.actions);
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Releases everything, most recently registered action first.
    pub fn run(mut self) {
        while let Some(action) = self.actions.pop() {
            action();
        }
    }
}

impl std::fmt::Debug for Teardown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Teardown")
            .field("actions", &self.actions.len())
            .finish()
    }
}
