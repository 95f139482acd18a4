//! Change observation for a render context.
//!
//! [`observe`] watches a set of root properties on a context object. Writes
//! to a watched root property report a [`Changelog::Set`] (or
//! [`Changelog::Delete`]); mutations anywhere inside a container reachable
//! from one report a [`Changelog::Modify`] against that root property.
//!
//! Containers carry a list of weak links back to the subscriptions that
//! reach them, each tagged with the root property it was reached from.
//! Dropping the [`Subscription`] makes every link dead; dead links are
//! pruned lazily on the next mutation.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tempera_carton::{CompactString, FxHashSet};

use crate::changelog::{Change, ChangeKind, Changelog, Key};
use crate::value::{Object, Value};

/// Callback receiving the root property name and what happened to it.
pub type Handler = Box<dyn Fn(&str, &Changelog)>;

struct Watch {
    keys: FxHashSet<CompactString>,
    on_set: Handler,
    on_modify: Option<Handler>,
}

impl Watch {
    fn modified(&self, root: &str, changelog: &Changelog) {
        match &self.on_modify {
            Some(on_modify) => on_modify(root, changelog),
            None => (self.on_set)(root, changelog),
        }
    }
}

struct Link {
    watch: Weak<Watch>,
    /// `None` on the context itself
    root_key: Option<CompactString>,
}

/// Back links from a container to the subscriptions reaching it.
#[derive(Default)]
pub(crate) struct Links {
    links: RefCell<Vec<Link>>,
}

impl Links {
    pub(crate) fn is_observed(&self) -> bool {
        let mut links = self.links.borrow_mut();
        links.retain(|link| link.watch.strong_count() > 0);
        !links.is_empty()
    }

    fn attach(&self, watch: &Rc<Watch>, root_key: Option<&str>) -> bool {
        let mut links = self.links.borrow_mut();
        let exists = links.iter().any(|link| {
            std::ptr::eq(link.watch.as_ptr(), Rc::as_ptr(watch))
                && link.root_key.as_deref() == root_key
        });
        if !exists {
            links.push(Link {
                watch: Rc::downgrade(watch),
                root_key: root_key.map(CompactString::from),
            });
        }
        !exists
    }

    fn live(&self) -> Vec<(Rc<Watch>, Option<CompactString>)> {
        self.links
            .borrow()
            .iter()
            .filter_map(|link| Some((link.watch.upgrade()?, link.root_key.clone())))
            .collect()
    }

    /// Link a value newly stored under `key` to every subscription that
    /// reaches this container.
    pub(crate) fn adopt(&self, key: Option<&str>, value: &Value) {
        if !value.is_container() {
            return;
        }
        for (watch, root_key) in self.live() {
            let root = match (root_key, key) {
                (Some(root), _) => root,
                (None, Some(key)) if watch.keys.contains(key) => CompactString::from(key),
                _ => continue,
            };
            link_deep(value, &watch, &root);
        }
    }

    /// Report changes made to this container.
    pub(crate) fn notify(&self, changes: Vec<Change>) {
        for (watch, root_key) in self.live() {
            match root_key {
                Some(root) => watch.modified(
                    &root,
                    &Changelog::Modify {
                        changes: changes.clone(),
                    },
                ),
                None => {
                    for change in &changes {
                        let Key::Name(name) = &change.key else {
                            continue;
                        };
                        if !watch.keys.contains(name) {
                            continue;
                        }
                        let old_value = change.old_value.clone();
                        let changelog = match change.kind {
                            ChangeKind::Delete => Changelog::Delete { old_value },
                            ChangeKind::Set | ChangeKind::Modify => Changelog::Set { old_value },
                        };
                        (watch.on_set)(name, &changelog);
                    }
                }
            }
        }
    }
}

fn link_deep(value: &Value, watch: &Rc<Watch>, root: &str) {
    match value {
        Value::Array(array) => {
            if array.links().attach(watch, Some(root)) {
                for item in array.to_vec() {
                    link_deep(&item, watch, root);
                }
            }
        }
        Value::Object(object) => {
            if object.links().attach(watch, Some(root)) {
                for (_, item) in object.entries() {
                    link_deep(&item, watch, root);
                }
            }
        }
        _ => {}
    }
}

/// Live observation of a context. Dropping it stops all notifications.
pub struct Subscription {
    watch: Rc<Watch>,
}

impl Subscription {
    pub fn is_watching(&self, key: &str) -> bool {
        self.watch.keys.contains(key)
    }

    pub fn disconnect(self) {}
}

/// Watch `keys` on `context`.
///
/// `on_set` runs when a root property is assigned or deleted. `on_modify`
/// runs when a container reachable from one is mutated in place; without
/// it, `on_set` receives those notifications too.
pub fn observe<K: Into<CompactString>>(
    context: &Object,
    keys: impl IntoIterator<Item = K>,
    on_set: impl Fn(&str, &Changelog) + 'static,
    on_modify: Option<Handler>,
) -> Subscription {
    let watch = Rc::new(Watch {
        keys: keys.into_iter().map(Into::into).collect(),
        on_set: Box::new(on_set),
        on_modify,
    });
    context.links().attach(&watch, None);
    for key in &watch.keys {
        link_deep(&context.get(key), &watch, key);
    }
    tracing::trace!(keys = watch.keys.len(), "observing context");
    Subscription { watch }
}
