//! Atelier - The incremental view-update engine for Tempera.
//!
//! Templates are plain markup with marker attributes:
//!
//! ```text
//! <ul>
//!   <li *foreach="todos" *class="done: @item.done">{{ @item.title }}</li>
//! </ul>
//! <input *value="draft" *on="change: add">
//! ```
//!
//! A template compiles once into a [`Blueprint`](template::Blueprint).
//! Mounting a [`View`] instantiates it against a context [`Object`] and
//! observes the context properties the template reads; changes schedule a
//! render, and a render re-evaluates every bound expression in document
//! order, touching only the nodes whose value changed. Lists keep one
//! fragment per entry and move fragments when their collection is shifted
//! or sorted instead of re-rendering them.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use tempera_atelier::{Engine, ManualFrames, Object, Scheduler, Value, View};
//!
//! let frames = ManualFrames::new();
//! let context = Object::new();
//! context.set("items", Value::from(vec!["a", "b"]));
//!
//! let view = View::mount(
//!     Rc::new(Engine::default()),
//!     Scheduler::new(frames.clone()),
//!     r#"<ul><li *foreach="items">{{ @item }}</li></ul>"#,
//!     context,
//! )
//! .unwrap();
//! frames.run_frame();
//! assert_eq!(view.html(), "<ul><li>a</li><li>b</li></ul>");
//! ```

pub mod changelog;
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod expression;
pub mod filters;
pub mod fragment;
pub mod markers;
pub mod observer;
pub mod path;
pub mod scheduler;
pub mod template;
pub mod value;
pub mod view;
pub mod watcher;

pub use changelog::{Change, ChangeKind, Changelog, Key};
pub use config::{load_config, EngineConfig, CONFIG_FILE};
pub use dom::{Document, Event, NodeId};
pub use engine::Engine;
pub use error::{Error, ErrorKind, Result};
pub use expression::{Env, Expression};
pub use filters::{Filter, FilterRegistry};
pub use fragment::VirtualFragment;
pub use markers::{Binding, Marker, MarkerRegistry, UpdateContext};
pub use observer::{observe, Subscription};
pub use path::{Path, Scope};
pub use scheduler::{FrameHost, ManualFrames, Scheduler};
pub use value::{Array, Object, Value};
pub use view::View;
pub use watcher::{execute, LiveTree, PassStats};
