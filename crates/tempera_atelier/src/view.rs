//! Views: a template mounted on a context and kept in sync with it.
//!
//! Mounting compiles the template, instantiates it into a fresh document
//! and observes every context property the template reads. Any change
//! schedules a render on the [`Scheduler`]; renders run the execute pass
//! over the whole document, so several changes in one frame cost one pass.

use std::cell::{Ref, RefCell};
use std::rc::{Rc, Weak};

use crate::dom::{Document, NodeId};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::fragment::VirtualFragment;
use crate::observer::{observe, Subscription};
use crate::scheduler::{Callback, Scheduler};
use crate::template::{instantiate, BlueprintId, Instantiation};
use crate::value::{Object, Value};
use crate::watcher::{execute, LiveTree, PassStats};

struct ViewState {
    engine: Rc<Engine>,
    tree: LiveTree,
    context: Object,
    fragment: Option<VirtualFragment>,
    renders: usize,
}

impl ViewState {
    fn render(&mut self) -> Result<PassStats> {
        if self.fragment.is_none() {
            return Ok(PassStats::default());
        }
        let root = self.tree.document.root();
        let stats = execute(&self.engine, &mut self.tree, &self.context, root)?;
        self.renders += 1;
        Ok(stats)
    }
}

pub struct View {
    state: Rc<RefCell<ViewState>>,
    scheduler: Scheduler,
    render: Callback,
    subscription: Option<Subscription>,
    blueprint: BlueprintId,
}

impl View {
    /// Mount `source` on `context`. The first render is scheduled, not run.
    pub fn mount(
        engine: Rc<Engine>,
        scheduler: Scheduler,
        source: &str,
        context: Object,
    ) -> Result<Self> {
        let blueprint = engine.compile(source)?;
        let mut tree = LiveTree::new();
        let fragment = instantiate(&engine, &mut tree, &context, Instantiation::new(blueprint))?;
        let root = tree.document.root();
        fragment.append_to(&mut tree.document, root);
        let roots = engine.templates().root_properties(blueprint);

        let state = Rc::new(RefCell::new(ViewState {
            engine,
            tree,
            context: context.clone(),
            fragment: Some(fragment),
            renders: 0,
        }));
        let render = render_task(Rc::downgrade(&state), scheduler.clone());

        let subscription = {
            let scheduler = scheduler.clone();
            let render = render.clone();
            observe(
                &context,
                roots,
                move |key, _| {
                    tracing::trace!(key, "context changed");
                    scheduler.schedule(render.clone());
                },
                None,
            )
        };
        scheduler.schedule(render.clone());
        tracing::debug!(blueprint = blueprint.0, "view mounted");

        Ok(Self {
            state,
            scheduler,
            render,
            subscription: Some(subscription),
            blueprint,
        })
    }

    /// Render now instead of waiting for the scheduled frame.
    pub fn render(&self) -> Result<PassStats> {
        self.state
            .try_borrow_mut()
            .map_err(|_| Error::type_error("view is already rendering"))?
            .render()
    }

    /// Schedule a render on the next frame.
    pub fn invalidate(&self) {
        self.scheduler.schedule(self.render.clone());
    }

    /// Deliver an event to `target`'s listeners. Returns how many ran.
    pub fn dispatch(&self, target: NodeId, event: &str, detail: Value) -> Result<usize> {
        self.state.borrow().tree.document.dispatch(target, event, detail)
    }

    /// Change a live element property, as user input would, then dispatch
    /// `event` on it.
    pub fn input(&self, target: NodeId, property: &str, value: Value, event: &str) -> Result<usize> {
        self.state
            .borrow_mut()
            .tree
            .document
            .set_property(target, property, value);
        self.dispatch(target, event, Value::Undefined)
    }

    pub fn document(&self) -> Ref<'_, Document> {
        Ref::map(self.state.borrow(), |state| &state.tree.document)
    }

    /// The rendered markup.
    pub fn html(&self) -> String {
        let document = self.document();
        document.serialize(document.root())
    }

    /// First element with `tag`, in document order.
    pub fn find(&self, tag: &str) -> Option<NodeId> {
        let document = self.document();
        document.find_element(document.root(), tag)
    }

    pub fn find_all(&self, tag: &str) -> Vec<NodeId> {
        let document = self.document();
        document.find_elements(document.root(), tag)
    }

    pub fn context(&self) -> Object {
        self.state.borrow().context.clone()
    }

    pub fn blueprint(&self) -> BlueprintId {
        self.blueprint
    }

    /// Completed render passes.
    pub fn renders(&self) -> usize {
        self.state.borrow().renders
    }

    pub fn watcher_count(&self) -> usize {
        self.state.borrow().tree.watchers.len()
    }

    pub fn is_connected(&self) -> bool {
        self.subscription.is_some()
    }

    /// Stop observing the context and tear the rendered content down.
    /// Renders still queued become no-ops.
    pub fn disconnect(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.disconnect();
        }
        let mut state = self.state.borrow_mut();
        if let Some(fragment) = state.fragment.take() {
            state.tree.remove_fragment(fragment);
        }
        tracing::debug!(blueprint = self.blueprint.0, "view disconnected");
    }
}

/// The scheduled render. It holds the view weakly, and when the view is busy
/// (an event listener flushed the scheduler) it puts itself back in the queue.
fn render_task(state: Weak<RefCell<ViewState>>, scheduler: Scheduler) -> Callback {
    let this: Rc<RefCell<Option<Weak<dyn Fn() -> Result<()>>>>> = Rc::default();
    let slot = this.clone();
    let render: Callback = Rc::new(move || {
        let Some(state) = state.upgrade() else {
            return Ok(());
        };
        let Ok(mut state) = state.try_borrow_mut() else {
            if let Some(render) = slot.borrow().as_ref().and_then(Weak::upgrade) {
                scheduler.schedule(render);
            }
            return Ok(());
        };
        state.render().map(|_| ())
    });
    *this.borrow_mut() = Some(Rc::downgrade(&render));
    render
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualFrames;

    fn mount(source: &str, context: Object) -> (View, ManualFrames) {
        let frames = ManualFrames::new();
        let scheduler = Scheduler::new(frames.clone());
        let view = View::mount(Rc::new(Engine::default()), scheduler, source, context).unwrap();
        (view, frames)
    }

    #[test]
    fn test_first_render_is_scheduled() {
        let context = Object::new();
        context.set("name", "Ada");
        let (view, frames) = mount("<p>{{ name }}</p>", context);
        assert_eq!(view.html(), "<p></p>");
        assert_eq!(frames.run_frame(), 1);
        assert_eq!(view.html(), "<p>Ada</p>");
        assert_eq!(view.renders(), 1);
    }

    #[test]
    fn test_changes_batch_into_one_render() {
        let context = Object::new();
        context.set("a", 1);
        context.set("b", 2);
        let (view, frames) = mount("<i>{{ a }}</i><b>{{ b }}</b>", context.clone());
        frames.run_frame();

        context.set("a", 10);
        context.set("b", 20);
        context.set("a", 11);
        assert_eq!(frames.pending(), 1);
        frames.run_frame();
        assert_eq!(view.html(), "<i>11</i><b>20</b>");
        assert_eq!(view.renders(), 2);
    }

    #[test]
    fn test_unread_property_does_not_render() {
        let context = Object::new();
        context.set("shown", 1);
        let (_view, frames) = mount("<i>{{ shown }}</i>", context.clone());
        frames.run_frame();
        context.set("hidden", 2);
        assert_eq!(frames.pending(), 0);
    }

    #[test]
    fn test_disconnect() {
        let context = Object::new();
        context.set("n", 1);
        let (mut view, frames) = mount("<i>{{ n }}</i>", context.clone());
        frames.run_frame();
        view.disconnect();
        assert!(!view.is_connected());
        assert_eq!(view.html(), "");
        assert_eq!(view.watcher_count(), 0);
        context.set("n", 2);
        assert_eq!(frames.pending(), 0);
    }
}
