//! Scheduler, path and observer behavior through the public API.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tempera_atelier::{
    observe, scheduler::Callback, Array, Changelog, ErrorKind, ManualFrames, Object, Path,
    Scheduler, Value,
};

// =============================================================================
// Scheduler
// =============================================================================

mod scheduling {
    use super::*;

    #[test]
    fn scheduling_twice_runs_once() {
        let frames = ManualFrames::new();
        let scheduler = Scheduler::new(frames.clone());
        let runs = Rc::new(Cell::new(0));
        let seen = runs.clone();
        let callback: Callback = Rc::new(move || {
            seen.set(seen.get() + 1);
            Ok(())
        });

        let returned = scheduler.schedule(callback.clone());
        scheduler.schedule(callback.clone());
        assert!(Rc::ptr_eq(&returned, &callback));
        assert_eq!(frames.pending(), 1);
        assert!(scheduler.is_pending());

        frames.run_frame();
        assert_eq!(runs.get(), 1);
        assert!(!scheduler.is_pending());
        assert_eq!(frames.run_frame(), 0);
    }

    #[test]
    fn callbacks_scheduled_during_a_batch_wait_for_the_next_frame() {
        let frames = ManualFrames::new();
        let scheduler = Scheduler::new(frames.clone());
        let log = Rc::new(RefCell::new(Vec::new()));

        let second: Callback = {
            let log = log.clone();
            Rc::new(move || {
                log.borrow_mut().push("second");
                Ok(())
            })
        };
        let first: Callback = {
            let log = log.clone();
            let scheduler = scheduler.clone();
            Rc::new(move || {
                log.borrow_mut().push("first");
                scheduler.schedule(second.clone());
                Ok(())
            })
        };
        scheduler.schedule(first);

        frames.run_frame();
        assert_eq!(*log.borrow(), vec!["first"]);
        frames.run_frame();
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }
}

// =============================================================================
// Paths
// =============================================================================

mod paths {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let context = Object::new();
        context.set("config", Object::new());
        for (raw, value) in [
            ("user.name", Value::from("ada")),
            ("user.tags[1]", Value::from("b")),
            ("matrix[0][2]", Value::from(9)),
            ("config['max-size']", Value::from(3)),
        ] {
            let path = Path::parse(raw).unwrap();
            path.set(&context, value.clone(), true).unwrap();
            assert_eq!(path.get(&context).unwrap(), value, "{raw}");
        }
        let tags = context.get("user").as_object().unwrap().get("tags");
        assert_eq!(tags.as_array().unwrap().len(), 2);
        assert!(tags.as_array().unwrap().get(0).is_undefined());
    }

    #[test]
    fn set_without_replace_keeps_defined_values() {
        let context = Object::new();
        context.set("user", Object::new());
        let name = Path::parse("user.name").unwrap();
        name.set(&context, Value::from("ada"), false).unwrap();
        name.set(&context, Value::from("grace"), false).unwrap();
        assert_eq!(name.get(&context).unwrap(), Value::from("ada"));

        let nick = Path::parse("user['nick']").unwrap();
        nick.set(&context, Value::Null, false).unwrap();
        nick.set(&context, Value::from("g"), false).unwrap();
        assert_eq!(nick.get(&context).unwrap(), Value::Null);
    }

    #[test]
    fn delete_prunes_empty_parents() {
        let context = Object::new();
        context.set("keep", 1);
        let path = Path::parse("a.b.c").unwrap();
        path.set(&context, Value::from(1), true).unwrap();
        path.delete(&context).unwrap();
        assert!(!context.contains_key("a"));
        assert!(context.contains_key("keep"));
    }

    #[test]
    fn call_uses_parent_as_this() {
        let counter = Object::new();
        counter.set("n", 2);
        counter.set(
            "double",
            Value::function(|this, _| {
                Ok(Value::from(this.as_object().unwrap().get("n").to_number() * 2.0))
            }),
        );
        let context = Object::new();
        context.set("counter", counter);
        assert_eq!(Path::parse("counter.double()").unwrap().get(&context).unwrap(), Value::from(4));
        let err = Path::parse("counter.n").unwrap().call(&context, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }
}

// =============================================================================
// Observation
// =============================================================================

mod observation {
    use super::*;

    #[test]
    fn nested_mutation_reaches_the_root_handler() {
        let items = Array::new();
        let context = Object::new();
        context.set("items", items.clone());
        let log = Rc::new(RefCell::new(Vec::new()));
        let seen = log.clone();
        let subscription = observe(
            &context,
            ["items"],
            move |key, changelog| {
                let kind = match changelog {
                    Changelog::Set { .. } => "set",
                    Changelog::Modify { .. } => "modify",
                    Changelog::Delete { .. } => "delete",
                };
                seen.borrow_mut().push(format!("{key} {kind}"));
            },
            None,
        );

        items.push(Value::from(1));
        context.set("items", Array::new());
        context.delete("items");
        context.set("other", 1);
        assert_eq!(*log.borrow(), vec!["items modify", "items set", "items delete"]);

        subscription.disconnect();
        context.set("items", 1);
        assert_eq!(log.borrow().len(), 3);
    }
}
