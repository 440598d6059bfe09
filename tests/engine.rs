//! Batching, state resolution, and patch minimality.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use reflow::{
    apply, dispatch, mount, read, reset_engine, set, CellHandle, ComponentDef, MemorySurface,
    MountHandle, Node, ParamSpec, Value,
};

type Shared<T> = Rc<RefCell<T>>;

/// Counter component: one cell starting at 1, rendered as a span with the
/// value in both an attribute and a text child.
struct Counter {
    def: Rc<ComponentDef>,
    renders: Rc<Cell<u32>>,
    handle: Shared<Option<CellHandle>>,
}

fn counter(initial: i64) -> Counter {
    let renders = Rc::new(Cell::new(0u32));
    let handle: Shared<Option<CellHandle>> = Rc::new(RefCell::new(None));
    let def = {
        let renders = renders.clone();
        let handle = handle.clone();
        ComponentDef::new("counter", ParamSpec::new(), move |ctx| {
            renders.set(renders.get() + 1);
            let cell = ctx.cell(initial);
            *handle.borrow_mut() = Some(cell);
            let value = ctx.read(&cell)?;
            Ok(Node::element("span")
                .attr("value", value.clone())
                .child(Node::text(value.to_string())))
        })
    };
    Counter { def, renders, handle }
}

fn mount_counter(initial: i64) -> (Counter, Shared<MemorySurface>, MountHandle, CellHandle) {
    let component = counter(initial);
    let surface = MemorySurface::shared();
    let mounted = mount(&component.def, Value::Null, surface.clone()).unwrap();
    let cell = component.handle.borrow().expect("cell declared on mount");
    (component, surface, mounted, cell)
}

#[test]
fn mount_renders_once_and_fills_the_surface() {
    reset_engine();

    let (component, surface, _mounted, _cell) = mount_counter(1);

    assert_eq!(component.renders.get(), 1);
    let surface = surface.borrow();
    let root = surface.root().unwrap();
    assert_eq!(root.tag(), Some("span"));
    assert_eq!(root.attr("value"), Some(&Value::Int(1)));
    assert_eq!(root.text_content(), "1");
}

#[test]
fn three_triggers_three_passes() {
    reset_engine();

    let (component, _surface, _mounted, cell) = mount_counter(1);

    for _ in 0..3 {
        dispatch(|| {
            apply(&cell, |v| Value::Int(v.as_int().unwrap() + 1)).unwrap();
        })
        .unwrap();
    }

    assert_eq!(read(&cell).unwrap(), Value::Int(4));
    // One mount render plus one per trigger.
    assert_eq!(component.renders.get(), 4);
}

#[test]
fn updates_in_one_trigger_batch_into_one_pass() {
    reset_engine();

    let renders = Rc::new(Cell::new(0u32));
    let handles: Shared<Option<(CellHandle, CellHandle)>> = Rc::new(RefCell::new(None));
    let def = {
        let renders = renders.clone();
        let handles = handles.clone();
        ComponentDef::new("pair", ParamSpec::new(), move |ctx| {
            renders.set(renders.get() + 1);
            let s1 = ctx.cell(333i64);
            let s2 = ctx.cell(666i64);
            *handles.borrow_mut() = Some((s1, s2));
            Ok(Node::element("div")
                .attr("s1", ctx.read(&s1)?)
                .attr("s2", ctx.read(&s2)?))
        })
    };
    let surface = MemorySurface::shared();
    let _mounted = mount(&def, Value::Null, surface.clone()).unwrap();
    let (s1, s2) = (*handles.borrow()).unwrap();

    dispatch(|| {
        let before = read(&s1).unwrap().as_int().unwrap();
        set(&s1, before + 1).unwrap();
        set(&s2, before * 100).unwrap();
        // Reads inside the batch still see pre-batch values.
        assert_eq!(read(&s1).unwrap(), Value::Int(333));
        assert_eq!(read(&s2).unwrap(), Value::Int(666));
    })
    .unwrap();

    assert_eq!(renders.get(), 2);
    assert_eq!(read(&s1).unwrap(), Value::Int(334));
    assert_eq!(read(&s2).unwrap(), Value::Int(33300));
    let surface = surface.borrow();
    assert_eq!(surface.root().unwrap().attr("s2"), Some(&Value::Int(33300)));
}

#[test]
fn cross_cell_updater_sees_pre_batch_value() {
    reset_engine();

    let handles: Shared<Option<(CellHandle, CellHandle)>> = Rc::new(RefCell::new(None));
    let def = {
        let handles = handles.clone();
        ComponentDef::new("pair", ParamSpec::new(), move |ctx| {
            let a = ctx.cell(10i64);
            let b = ctx.cell(0i64);
            *handles.borrow_mut() = Some((a, b));
            Ok(Node::element("div").attr("b", ctx.read(&b)?))
        })
    };
    let surface = MemorySurface::shared();
    let _mounted = mount(&def, Value::Null, surface).unwrap();
    let (a, b) = (*handles.borrow()).unwrap();

    dispatch(|| {
        apply(&a, |v| Value::Int(v.as_int().unwrap() + 1)).unwrap();
        // B's updater reads A while resolving: it must observe A's
        // pre-batch value, not the +1 queued above.
        apply(&b, move |_| {
            Value::Int(read(&a).unwrap().as_int().unwrap() * 100)
        })
        .unwrap();
    })
    .unwrap();

    assert_eq!(read(&a).unwrap(), Value::Int(11));
    assert_eq!(read(&b).unwrap(), Value::Int(1000));
}

#[test]
fn sequential_function_updates_to_one_cell_chain() {
    reset_engine();

    let (_component, _surface, _mounted, cell) = mount_counter(1);

    dispatch(|| {
        apply(&cell, |v| Value::Int(v.as_int().unwrap() + 1)).unwrap();
        apply(&cell, |v| Value::Int(v.as_int().unwrap() + 1)).unwrap();
        apply(&cell, |v| Value::Int(v.as_int().unwrap() * 10)).unwrap();
    })
    .unwrap();

    // (1 + 1 + 1) * 10: each Apply saw the queued result for this cell.
    assert_eq!(read(&cell).unwrap(), Value::Int(30));
}

#[test]
fn equal_value_update_rerenders_without_touching_the_surface() {
    reset_engine();

    let (component, surface, _mounted, cell) = mount_counter(1);
    let ops_after_mount = surface.borrow().ops_applied();

    dispatch(|| {
        set(&cell, 1i64).unwrap();
    })
    .unwrap();

    // Render re-executed, patch was empty.
    assert_eq!(component.renders.get(), 2);
    assert_eq!(surface.borrow().ops_applied(), ops_after_mount);
}

#[test]
fn changed_attribute_patches_exactly_one_op() {
    reset_engine();

    let (_component, surface, _mounted, cell) = mount_counter(7);
    let ops_after_mount = surface.borrow().ops_applied();

    dispatch(|| {
        set(&cell, 8i64).unwrap();
    })
    .unwrap();

    // One SetAttr and one SetText; nothing else moved.
    assert_eq!(surface.borrow().ops_applied(), ops_after_mount + 2);
    assert_eq!(surface.borrow().root().unwrap().text_content(), "8");
}

#[test]
fn descendants_rerender_with_their_ancestor() {
    reset_engine();

    let child_renders = Rc::new(Cell::new(0u32));
    let child_def = {
        let child_renders = child_renders.clone();
        ComponentDef::new(
            "label",
            ParamSpec::new().required("text", reflow::ValueKind::Str),
            move |ctx| {
                child_renders.set(child_renders.get() + 1);
                Ok(Node::element("p").child(Node::text(ctx.prop("text").to_string())))
            },
        )
    };

    let parent_cell: Shared<Option<CellHandle>> = Rc::new(RefCell::new(None));
    let parent_def = {
        let parent_cell = parent_cell.clone();
        let child_def = child_def.clone();
        ComponentDef::new("parent", ParamSpec::new(), move |ctx| {
            let tick = ctx.cell(0i64);
            *parent_cell.borrow_mut() = Some(tick);
            Ok(Node::element("div")
                .attr("tick", ctx.read(&tick)?)
                // Child props never change; it re-renders anyway.
                .child(Node::component(
                    &child_def,
                    Value::record([("text", Value::from("static"))]),
                )))
        })
    };

    let surface = MemorySurface::shared();
    let _mounted = mount(&parent_def, Value::Null, surface.clone()).unwrap();
    assert_eq!(child_renders.get(), 1);

    let tick = (*parent_cell.borrow()).unwrap();
    let ops_before = surface.borrow().ops_applied();
    dispatch(|| {
        set(&tick, 1i64).unwrap();
    })
    .unwrap();

    // Child re-rendered with its parent, but its unchanged output
    // contributed nothing to the patch.
    assert_eq!(child_renders.get(), 2);
    assert_eq!(surface.borrow().ops_applied(), ops_before + 1);
}

#[test]
fn child_only_update_leaves_parent_alone() {
    reset_engine();

    let parent_renders = Rc::new(Cell::new(0u32));
    let child_cell: Shared<Option<CellHandle>> = Rc::new(RefCell::new(None));

    let child_def = {
        let child_cell = child_cell.clone();
        ComponentDef::new("child", ParamSpec::new(), move |ctx| {
            let n = ctx.cell(0i64);
            *child_cell.borrow_mut() = Some(n);
            Ok(Node::element("span").attr("n", ctx.read(&n)?))
        })
    };
    let parent_def = {
        let parent_renders = parent_renders.clone();
        let child_def = child_def.clone();
        ComponentDef::new("parent", ParamSpec::new(), move |_ctx| {
            parent_renders.set(parent_renders.get() + 1);
            Ok(Node::element("div")
                .child(Node::text("header"))
                .child(Node::component(&child_def, Value::Null)))
        })
    };

    let surface = MemorySurface::shared();
    let _mounted = mount(&parent_def, Value::Null, surface.clone()).unwrap();
    let n = (*child_cell.borrow()).unwrap();

    dispatch(|| {
        set(&n, 5i64).unwrap();
    })
    .unwrap();

    assert_eq!(parent_renders.get(), 1);
    let surface = surface.borrow();
    let root = surface.root().unwrap();
    assert_eq!(root.node_at(&[1]).unwrap().attr("n"), Some(&Value::Int(5)));
}

#[test]
fn type_change_at_a_position_discards_nested_state() {
    reset_engine();

    let a_cell: Shared<Option<CellHandle>> = Rc::new(RefCell::new(None));
    let def_a = {
        let a_cell = a_cell.clone();
        ComponentDef::new("variant_a", ParamSpec::new(), move |ctx| {
            let n = ctx.cell(0i64);
            *a_cell.borrow_mut() = Some(n);
            Ok(Node::element("span").attr("n", ctx.read(&n)?))
        })
    };
    let def_b = ComponentDef::new("variant_b", ParamSpec::new(), |_ctx| {
        Ok(Node::element("em").child(Node::text("other")))
    });

    let toggle_cell: Shared<Option<CellHandle>> = Rc::new(RefCell::new(None));
    let parent_def = {
        let toggle_cell = toggle_cell.clone();
        let def_a = def_a.clone();
        let def_b = def_b.clone();
        ComponentDef::new("switcher", ParamSpec::new(), move |ctx| {
            let which = ctx.cell(true);
            *toggle_cell.borrow_mut() = Some(which);
            let inner = if ctx.read(&which)?.as_bool().unwrap() {
                Node::component(&def_a, Value::Null)
            } else {
                Node::component(&def_b, Value::Null)
            };
            Ok(Node::element("div").child(inner))
        })
    };

    let surface = MemorySurface::shared();
    let _mounted = mount(&parent_def, Value::Null, surface.clone()).unwrap();
    let toggle = (*toggle_cell.borrow()).unwrap();

    // Give variant A some state, then swap it out and back in.
    let first_a = (*a_cell.borrow()).unwrap();
    dispatch(|| set(&first_a, 42i64).unwrap()).unwrap();
    assert_eq!(read(&first_a).unwrap(), Value::Int(42));

    dispatch(|| set(&toggle, false).unwrap()).unwrap();
    assert_eq!(surface.borrow().root().unwrap().text_content(), "other");
    // The old instance is gone, its handle is stale.
    assert!(!first_a.is_live());
    assert!(read(&first_a).is_err());

    dispatch(|| set(&toggle, true).unwrap()).unwrap();
    let second_a = (*a_cell.borrow()).unwrap();
    // Fresh instance, fresh state.
    assert_eq!(read(&second_a).unwrap(), Value::Int(0));
}

#[test]
fn update_outside_dispatch_is_its_own_trigger() {
    reset_engine();

    let (component, _surface, _mounted, cell) = mount_counter(1);

    // An async completion calls straight in, with no dispatch wrapper.
    apply(&cell, |v| Value::Int(v.as_int().unwrap() + 1)).unwrap();

    assert_eq!(read(&cell).unwrap(), Value::Int(2));
    assert_eq!(component.renders.get(), 2);
}
