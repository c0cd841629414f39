use crate::priority::Priority;
use crate::scheduler::Scheduler;
use crate::Host;
use std::rc::Rc;

impl<H: Host> Scheduler<H> {
    /// The ambient priority, used by code that doesn't name one.
    pub fn current_priority_level(&self) -> Priority {
        self.inner.state.borrow().current_priority
    }

    /// Runs `f` with `priority` as the ambient priority, restoring the previous
    /// one afterwards, also when `f` panics.
    pub fn run_with_priority<R>(&self, priority: Priority, f: impl FnOnce() -> R) -> R {
        let _scope = self.enter_priority(priority);
        f()
    }

    /// Like [`run_with_priority`](Self::run_with_priority) but never raises
    /// the ambient priority: anything more urgent than `Normal` is lowered to
    /// `Normal`, anything less urgent stays where it is.
    pub fn next<R>(&self, f: impl FnOnce() -> R) -> R {
        let priority = match self.current_priority_level() {
            Priority::Immediate | Priority::UserBlocking | Priority::Normal => Priority::Normal,
            other => other,
        };
        self.run_with_priority(priority, f)
    }

    /// Captures the ambient priority now and reinstates it on every call of the
    /// returned closure, whatever the ambient priority is at call time.
    pub fn wrap_callback<A, R, F>(&self, mut f: F) -> impl FnMut(A) -> R + use<H, A, R, F>
    where
        F: FnMut(A) -> R,
    {
        let parent_priority = self.current_priority_level();
        let weak = Rc::downgrade(&self.inner);
        move |arg| match weak.upgrade() {
            Some(inner) => {
                Scheduler::from_inner(inner).run_with_priority(parent_priority, || f(arg))
            }
            None => f(arg),
        }
    }

    fn enter_priority(&self, priority: Priority) -> PriorityScope<'_, H> {
        let previous = {
            let mut state = self.inner.state.borrow_mut();
            std::mem::replace(&mut state.current_priority, priority)
        };
        PriorityScope {
            scheduler: self,
            previous,
        }
    }
}

struct PriorityScope<'a, H: Host> {
    scheduler: &'a Scheduler<H>,
    previous: Priority,
}

impl<H: Host> Drop for PriorityScope<'_, H> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.scheduler.inner.state.try_borrow_mut() {
            state.current_priority = self.previous;
        }
    }
}
