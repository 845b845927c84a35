//! Generic callback registry (spec component F, §9 "Callback registries vs.
//! growable function-pointer arrays").
//!
//! Every hook kind in the system (join, part, kick, nick-change, …) is an
//! instance of `Registry<Args>` rather than a bespoke growable array; this
//! preserves the source's registration-order semantics while giving us one
//! reusable abstraction instead of one per event kind.

/// Whether a hook consumed (destroyed) its argument's subject.
///
/// A hook that removes the entity it was passed (e.g. a part-hook that also
/// deletes the now-empty channel) returns `StopIteration` so the registry
/// does not hand the now-invalid reference to any remaining hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookResult {
    Continue,
    StopIteration,
}

/// A token identifying one registered hook, for later deregistration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

pub struct Registry<Args> {
    hooks: Vec<(HookId, Box<dyn FnMut(&Args) -> HookResult>)>,
    next_id: u64,
}

impl<Args> Default for Registry<Args> {
    fn default() -> Self {
        Self {
            hooks: Vec::new(),
            next_id: 0,
        }
    }
}

impl<Args> Registry<Args> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook. Hooks fire in registration order.
    pub fn register(&mut self, hook: impl FnMut(&Args) -> HookResult + 'static) -> HookId {
        let id = HookId(self.next_id);
        self.next_id += 1;
        self.hooks.push((id, Box::new(hook)));
        id
    }

    /// Convenience for hooks that never consume their argument.
    pub fn register_simple(&mut self, mut hook: impl FnMut(&Args) + 'static) -> HookId {
        self.register(move |args| {
            hook(args);
            HookResult::Continue
        })
    }

    pub fn unregister(&mut self, id: HookId) -> bool {
        if let Some(pos) = self.hooks.iter().position(|(hid, _)| *hid == id) {
            self.hooks.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Fire every hook in registration order. Stops early if a hook reports
    /// that it consumed the argument's subject.
    pub fn fire(&mut self, args: &Args) {
        for (_, hook) in &mut self.hooks {
            if hook(args) == HookResult::StopIteration {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn fires_in_registration_order() {
        let mut reg: Registry<()> = Registry::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let o1 = order.clone();
        reg.register_simple(move |_| o1.borrow_mut().push(1));
        let o2 = order.clone();
        reg.register_simple(move |_| o2.borrow_mut().push(2));
        let o3 = order.clone();
        reg.register_simple(move |_| o3.borrow_mut().push(3));
        reg.fire(&());
        assert_eq!(*order.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn stop_iteration_halts_remaining_hooks() {
        let mut reg: Registry<()> = Registry::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let o1 = order.clone();
        reg.register(move |_| {
            o1.borrow_mut().push(1);
            HookResult::StopIteration
        });
        let o2 = order.clone();
        reg.register_simple(move |_| o2.borrow_mut().push(2));
        reg.fire(&());
        assert_eq!(*order.borrow(), vec![1]);
    }

    #[test]
    fn deregistration_removes_the_hook() {
        let mut reg: Registry<()> = Registry::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let o1 = order.clone();
        let id = reg.register_simple(move |_| o1.borrow_mut().push(1));
        let o2 = order.clone();
        reg.register_simple(move |_| o2.borrow_mut().push(2));
        assert!(reg.unregister(id));
        reg.fire(&());
        assert_eq!(*order.borrow(), vec![2]);
        assert!(!reg.unregister(id), "double deregister should be a no-op");
    }
}
