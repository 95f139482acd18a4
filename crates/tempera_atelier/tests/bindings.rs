//! Attribute, class, style, property, event and conditional bindings.

use std::cell::RefCell;
use std::rc::Rc;

use tempera_atelier::{
    Engine, ErrorKind, ManualFrames, Object, Scheduler, Value, View,
};

fn mount(source: &str, context: &Object) -> (View, ManualFrames) {
    let frames = ManualFrames::new();
    let scheduler = Scheduler::new(frames.clone());
    let view = View::mount(Rc::new(Engine::default()), scheduler, source, context.clone())
        .expect("template should mount");
    frames.run_frame();
    (view, frames)
}

// =============================================================================
// Conditionals
// =============================================================================

mod conditional {
    use super::*;

    #[test]
    fn toggles_content() {
        let context = Object::new();
        context.set("open", false);
        context.set("title", "Menu");
        let (view, frames) = mount(r#"<nav><b *if="open">{{ title }}</b></nav>"#, &context);
        insta::assert_snapshot!(view.html(), @"<nav></nav>");

        context.set("open", true);
        frames.run_frame();
        insta::assert_snapshot!(view.html(), @"<nav><b>Menu</b></nav>");

        context.set("title", "Close");
        frames.run_frame();
        insta::assert_snapshot!(view.html(), @"<nav><b>Close</b></nav>");
    }

    #[test]
    fn reshow_instantiates_fresh_nodes() {
        let context = Object::new();
        context.set("open", true);
        let (view, frames) = mount(r#"<p *if="open">hi</p>"#, &context);
        let first = view.find("p").unwrap();

        context.set("open", 0);
        frames.run_frame();
        assert_eq!(view.find("p"), None);

        context.set("open", "yes");
        frames.run_frame();
        let second = view.find("p").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn truthiness_change_only() {
        let context = Object::new();
        context.set("count", 1);
        let (view, frames) = mount(r#"<p *if="count">{{ count }}</p>"#, &context);
        let first = view.find("p").unwrap();

        context.set("count", 2);
        frames.run_frame();
        assert_eq!(view.find("p"), Some(first));
        insta::assert_snapshot!(view.html(), @"<p>2</p>");
    }

    #[test]
    fn negated_with_filter() {
        let context = Object::new();
        context.set("items", Value::from(Vec::<Value>::new()));
        let (view, _frames) = mount(
            r#"<p *if="items.length | not">empty</p><ul *if="items.length"></ul>"#,
            &context,
        );
        insta::assert_snapshot!(view.html(), @"<p>empty</p>");
    }
}

// =============================================================================
// Attributes and properties
// =============================================================================

mod attributes {
    use super::*;

    #[test]
    fn attr_values() {
        let context = Object::new();
        context.set("label", "Save");
        context.set("busy", true);
        context.set("count", Value::Null);
        let (view, frames) = mount(
            r#"<button *attr="title: label; disabled: busy; data-n: count"></button>"#,
            &context,
        );
        insta::assert_snapshot!(view.html(), @r#"<button title="Save" disabled></button>"#);

        context.set("busy", false);
        context.set("count", 3);
        frames.run_frame();
        insta::assert_snapshot!(view.html(), @r#"<button title="Save" data-n="3"></button>"#);
    }

    #[test]
    fn property_shorthand() {
        let context = Object::new();
        context.set("html", "<b>");
        context.set("n", 5);
        let (view, _frames) = mount(r#"<div .textContent="html" .tabIndex="n">x</div>"#, &context);
        let div = view.find("div").unwrap();
        assert_eq!(view.document().property(div, "tabIndex"), Value::from(5));
        insta::assert_snapshot!(view.html(), @"<div>&lt;b&gt;</div>");
    }

    #[test]
    fn filters_apply_in_order() {
        let context = Object::new();
        context.set("name", "  ada ");
        context.set("nick", Value::Null);
        let (view, _frames) = mount(
            r#"<p>{{ name | trim | upper }}</p><i>{{ nick | default: 'anon' }}</i>"#,
            &context,
        );
        insta::assert_snapshot!(view.html(), @"<p>ADA</p><i>anon</i>");
    }
}

// =============================================================================
// Classes and styles
// =============================================================================

mod classes {
    use super::*;

    #[test]
    fn class_set_tracks_changes() {
        let classes = Object::new();
        classes.set("a", true);
        classes.set("b", false);
        let context = Object::new();
        context.set("classes", classes.clone());
        let (view, frames) = mount(r#"<div class="base" *class="classes"></div>"#, &context);
        insta::assert_snapshot!(view.html(), @r#"<div class="base a"></div>"#);

        classes.set("b", true);
        frames.run_frame();
        insta::assert_snapshot!(view.html(), @r#"<div class="base a b"></div>"#);

        classes.set("a", false);
        frames.run_frame();
        insta::assert_snapshot!(view.html(), @r#"<div class="base b"></div>"#);

        context.set("classes", "c");
        frames.run_frame();
        insta::assert_snapshot!(view.html(), @r#"<div class="base c"></div>"#);
    }

    #[test]
    fn deleted_key_drops_its_class() {
        let classes = Object::new();
        classes.set("one", true);
        classes.set("two", false);
        let context = Object::new();
        context.set("classes", classes.clone());
        let (view, frames) = mount(r#"<p id="x" *class="classes"></p>"#, &context);
        insta::assert_snapshot!(view.html(), @r#"<p id="x" class="one"></p>"#);

        classes.delete("one");
        classes.set("two", true);
        frames.run_frame();
        insta::assert_snapshot!(view.html(), @r#"<p id="x" class="two"></p>"#);
    }

    #[test]
    fn named_class_toggle() {
        let context = Object::new();
        context.set("active", 1);
        let (view, frames) = mount(r#"<a *class="on: active"></a>"#, &context);
        insta::assert_snapshot!(view.html(), @r#"<a class="on"></a>"#);
        context.set("active", 0);
        frames.run_frame();
        insta::assert_snapshot!(view.html(), @"<a></a>");
    }

    #[test]
    fn style_map_and_single() {
        let style = Object::new();
        style.set("color", "red");
        style.set("width", "10px");
        let context = Object::new();
        context.set("style", style.clone());
        context.set("size", "2em");
        let (view, frames) = mount(
            r#"<p *style="style"></p><q *style="font-size: size"></q>"#,
            &context,
        );
        insta::assert_snapshot!(
            view.html(),
            @r#"<p style="color: red; width: 10px;"></p><q style="font-size: 2em;"></q>"#
        );

        style.delete("color");
        context.set("size", Value::Null);
        frames.run_frame();
        insta::assert_snapshot!(view.html(), @r#"<p style="width: 10px;"></p><q></q>"#);
    }
}

// =============================================================================
// Events
// =============================================================================

mod events {
    use super::*;

    #[test]
    fn listener_receives_event_and_locals() {
        let picked = Rc::new(RefCell::new(Vec::new()));
        let seen = picked.clone();
        let context = Object::new();
        context.set("items", Value::from(vec!["a", "b"]));
        context.set(
            "pick",
            Value::function(move |_this, args| {
                let event = args[0].as_object().unwrap().get("type");
                let item = args[1].as_object().unwrap().get("item");
                seen.borrow_mut()
                    .push(format!("{} {}", event.to_display_string(), item.to_display_string()));
                Ok(Value::Undefined)
            }),
        );
        let (view, _frames) = mount(
            r#"<li *foreach="items" *on="click: pick">{{ @item }}</li>"#,
            &context,
        );

        let second = view.find_all("li")[1];
        assert_eq!(view.dispatch(second, "click", Value::Undefined).unwrap(), 1);
        assert_eq!(view.dispatch(second, "keyup", Value::Undefined).unwrap(), 0);
        assert_eq!(*picked.borrow(), vec!["click b"]);
    }

    #[test]
    fn method_gets_its_object_as_this() {
        let store = Object::new();
        store.set("count", 0);
        store.set(
            "increment",
            Value::function(|this, _| {
                let store = this.as_object().unwrap();
                let next = store.get("count").to_number() + 1.0;
                store.set("count", next);
                Ok(Value::Undefined)
            }),
        );
        let context = Object::new();
        context.set("store", store);
        let (view, frames) = mount(
            r#"<button *on="click: store.increment">{{ store.count }}</button>"#,
            &context,
        );
        let button = view.find("button").unwrap();
        view.dispatch(button, "click", Value::Undefined).unwrap();
        view.dispatch(button, "click", Value::Undefined).unwrap();
        frames.run_frame();
        insta::assert_snapshot!(view.html(), @"<button>2</button>");
    }
}

// =============================================================================
// Errors
// =============================================================================

mod errors {
    use super::*;

    #[test]
    fn unknown_marker_fails_to_mount() {
        let frames = ManualFrames::new();
        let err = View::mount(
            Rc::new(Engine::default()),
            Scheduler::new(frames),
            r#"<div><span *shout="x"></span></div>"#,
            Object::new(),
        )
        .err()
        .unwrap();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert_eq!(err.node_tag(), Some(r#"<span *shout="x">"#));
    }

    #[test]
    fn render_errors_name_the_element() {
        let frames = ManualFrames::new();
        let scheduler = Scheduler::new(frames.clone());
        let _view = View::mount(
            Rc::new(Engine::default()),
            scheduler.clone(),
            r#"<p id="greeting" *attr="title: user.name"></p>"#,
            Object::new(),
        )
        .unwrap();
        frames.run_frame();

        let errors = scheduler.take_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), ErrorKind::Reference);
        assert!(errors[0].to_string().ends_with(r#"at <p id="greeting">"#));
    }
}
