
use std::{cell::RefCell, rc::Rc};

use assert_call::{call, Call, CallRecorder};
use entity_outbox::*;
use futures::executor::LocalPool;
use rstest::rstest;

use self::test_utils::*;

struct Fixture {
    pool: LocalPool,
    gateway: Rc<HeldGateway>,
    outbox: Outbox<Product>,
}

fn fixture(items: Vec<Product>) -> Fixture {
    let pool = LocalPool::new();
    let gateway = HeldGateway::new(items.clone());
    let outbox = Outbox::<Product>::builder("products", gateway.clone())
        .entities(items)
        .spawner(Spawner::from_local_spawn(pool.spawner()))
        .build();
    Fixture {
        pool,
        gateway,
        outbox,
    }
}

fn widget() -> Product {
    product("1", "Widget", 10)
}

#[test]
fn scenario_empty_ledger() {
    let f = fixture(vec![widget()]);
    let view = f.outbox.view();
    assert_eq!(view.data.len(), 1);
    let e = &view.data[0];
    assert_eq!(e.item, widget());
    assert!(!e.meta.is_deleting);
    assert!(!e.meta.is_updating);
    assert!(!e.meta.is_mutating);
    assert!(e.meta.update.is_none());
    assert!(e.meta.errors.is_empty());
    assert!(!view.is_adding);
    assert!(view.additions.is_empty());
}

#[test]
fn scenario_delete() {
    let mut cr = CallRecorder::new();
    let mut f = fixture(vec![widget()]);
    f.outbox.enqueue_deletion(widget());

    let view = f.outbox.view();
    assert!(view.data[0].meta.is_deleting && view.data[0].meta.is_mutating);

    f.pool.run_until_stalled();
    cr.verify("delete 1");
    let view = f.outbox.view();
    assert!(view.data[0].meta.is_deleting && view.data[0].meta.is_mutating);

    f.gateway.release();
    f.pool.run_until_stalled();
    assert!(f.outbox.entities().get("1").is_none());
    assert!(f.outbox.ledger().is_empty());
    assert!(f.outbox.ledger().in_flight().is_none());
    assert!(f.outbox.view().data.is_empty());
}

#[test]
fn scenario_add() {
    let mut cr = CallRecorder::new();
    let gateway = HeldGateway::new((1..=41).map(|i| product(&i.to_string(), "x", 1)).collect());
    let mut pool = LocalPool::new();
    let outbox = Outbox::<Product>::builder("products", gateway.clone())
        .spawner(Spawner::from_local_spawn(pool.spawner()))
        .build();

    outbox.enqueue_addition("tmp-1", draft("Gizmo", 5));
    let view = outbox.view();
    assert!(view.is_adding);
    assert_eq!(view.additions.len(), 1);
    assert_eq!(view.additions[0].draft, draft("Gizmo", 5));

    pool.run_until_stalled();
    cr.verify("create Gizmo");
    gateway.release();
    pool.run_until_stalled();

    assert_eq!(outbox.entities().get("42"), Some(product("42", "Gizmo", 5)));
    assert!(outbox.ledger().is_empty());
    let view = outbox.view();
    assert!(!view.is_adding);
    assert!(view.additions.is_empty());
}

#[test]
fn scenario_failed_update() {
    let mut cr = CallRecorder::new();
    let mut f = fixture(vec![widget()]);
    f.gateway
        .server
        .fail_next(GatewayError::new(500, "Server Error"));
    f.outbox.enqueue_update(product("1", "Widget", 20));
    f.pool.run_until_stalled();
    cr.verify("update 1 20");
    f.gateway.release();
    f.pool.run_until_stalled();

    let dead_letters = f.outbox.dead_letters().borrow().to_vec();
    assert_eq!(dead_letters.len(), 1);
    assert_eq!(dead_letters[0].kind(), ChangeKind::Update);
    assert_eq!(dead_letters[0].target_id(), "1");
    assert_eq!(dead_letters[0].error.status, 500);
    assert_eq!(dead_letters[0].error.status_text, "Server Error");
    assert!(f.outbox.ledger().is_empty());
    assert_eq!(f.outbox.entities().get("1"), Some(widget()));

    let view = f.outbox.view();
    assert_eq!(view.data[0].meta.errors.len(), 1);
    assert_eq!(view.data[0].meta.errors[0].kind, ChangeKind::Update);
    assert!(!view.data[0].meta.is_mutating);
}

#[rstest]
fn fifo_one_at_a_time(#[values(1, 2, 5)] count: u32) {
    let mut cr = CallRecorder::new();
    let mut f = fixture(vec![widget()]);
    for price in 1..=count {
        f.outbox.enqueue_update(product("1", "Widget", price));
    }
    for price in 1..=count {
        f.pool.run_until_stalled();
        cr.verify(Call::id(format!("update 1 {price}")));
        assert_eq!(f.gateway.held(), 1);
        assert_eq!(f.outbox.state(), CoordinatorState::Draining);
        f.gateway.release();
    }
    f.pool.run_until_stalled();
    cr.verify(());
    assert_eq!(f.outbox.state(), CoordinatorState::Idle);
    assert_eq!(f.outbox.entities().get("1"), Some(product("1", "Widget", count)));
}

#[test]
fn enqueue_while_draining_waits() {
    let mut cr = CallRecorder::new();
    let mut f = fixture(vec![widget()]);
    f.outbox.enqueue_update(product("1", "Widget", 11));
    f.pool.run_until_stalled();
    cr.verify("update 1 11");

    f.outbox.enqueue_update(product("1", "Widget", 12));
    f.pool.run_until_stalled();
    cr.verify(());
    let meta = f.outbox.view().data[0].meta.clone();
    assert_eq!(meta.update, Some(product("1", "Widget", 12)));

    f.gateway.release();
    f.pool.run_until_stalled();
    cr.verify("update 1 12");
    f.gateway.release();
    f.pool.run_until_stalled();
    assert_eq!(f.gateway.server.items(), vec![product("1", "Widget", 12)]);
}

#[test]
fn delete_queued_addition_sends_nothing() {
    let mut cr = CallRecorder::new();
    let mut f = fixture(vec![widget()]);
    f.outbox.enqueue_update(product("1", "Widget", 11));
    f.outbox.enqueue_addition("tmp-1", draft("Gizmo", 5));
    let provisional = f.outbox.view().additions[0].clone();

    let deletion = f.outbox.delete_provisional(&provisional);
    assert!(matches!(deletion, Deletion::Cancelled(ref removed) if removed.len() == 1));
    assert!(f.outbox.view().additions.is_empty());

    f.pool.run_until_stalled();
    f.gateway.release();
    f.pool.run_until_stalled();
    cr.verify("update 1 11");
    assert_eq!(f.gateway.server.items().len(), 1);
}

#[test]
fn delete_in_flight_addition_uses_server_id() {
    let mut cr = CallRecorder::new();
    let mut f = fixture(vec![widget()]);
    f.outbox.enqueue_addition("tmp-1", draft("Gizmo", 5));
    f.pool.run_until_stalled();
    cr.verify("create Gizmo");

    let provisional = f.outbox.view().additions[0].clone();
    assert_eq!(f.outbox.delete_provisional(&provisional), Deletion::Enqueued);

    f.gateway.release();
    f.pool.run_until_stalled();
    cr.verify("delete 2");
    f.gateway.release();
    f.pool.run_until_stalled();
    assert_eq!(f.gateway.server.items(), vec![widget()]);
    assert_eq!(f.outbox.entities().to_vec(), vec![widget()]);
}

#[test]
fn delete_created_provisional_uses_server_id() {
    let mut cr = CallRecorder::new();
    let mut f = fixture(Vec::new());
    f.outbox.enqueue_addition("tmp-1", draft("Gizmo", 5));
    f.pool.run_until_stalled();
    cr.verify("create Gizmo");
    let provisional = f.outbox.view().additions[0].clone();
    f.gateway.release();
    f.pool.run_until_stalled();
    assert_eq!(f.outbox.entities().to_vec(), vec![product("1", "Gizmo", 5)]);

    assert_eq!(f.outbox.delete_provisional(&provisional), Deletion::Enqueued);
    assert!(f.outbox.view().data[0].meta.is_deleting);
    f.pool.run_until_stalled();
    cr.verify("delete 1");
    f.gateway.release();
    f.pool.run_until_stalled();
    assert!(f.gateway.server.items().is_empty());
    assert!(f.outbox.entities().is_empty());
    assert!(f.outbox.dead_letters().is_empty());
}

#[test]
fn changes_to_rejected_provisional_send_nothing() {
    let mut cr = CallRecorder::new();
    let mut f = fixture(Vec::new());
    f.gateway
        .server
        .fail_next(GatewayError::new(503, "Service Unavailable"));
    f.outbox.enqueue_addition("tmp-1", draft("Gizmo", 5));
    f.pool.run_until_stalled();
    let provisional = f.outbox.view().additions[0].clone();
    f.gateway.release();
    f.pool.run_until_stalled();
    cr.verify("create Gizmo");

    assert_eq!(
        f.outbox.delete_provisional(&provisional),
        Deletion::Cancelled(Vec::new())
    );
    f.outbox
        .enqueue_update(Product::from_draft("tmp-1".into(), draft("Gizmo", 6)));
    assert!(f.outbox.ledger().is_empty());
    f.pool.run_until_stalled();
    cr.verify(());
    assert_eq!(f.gateway.held(), 0);
    assert_eq!(f.outbox.dead_letters().len(), 1);
}

#[test]
fn in_flight_provisional_shows_queued_changes() {
    let _cr = CallRecorder::new();
    let mut f = fixture(Vec::new());
    f.outbox.enqueue_addition("tmp-1", draft("Gizmo", 5));
    f.pool.run_until_stalled();
    let provisional = f.outbox.view().additions[0].clone();
    assert!(!provisional.meta.is_mutating);

    f.outbox.delete_provisional(&provisional);
    let view = f.outbox.view();
    assert!(view.additions[0].meta.is_deleting);
    assert!(view.additions[0].meta.is_mutating);
}

#[test]
fn retry_dead_letter() {
    let mut cr = CallRecorder::new();
    let mut f = fixture(Vec::new());
    f.gateway
        .server
        .fail_next(GatewayError::new(503, "Service Unavailable"));
    f.outbox.enqueue_addition("tmp-1", draft("Gizmo", 5));
    f.pool.run_until_stalled();
    f.gateway.release();
    f.pool.run_until_stalled();
    cr.verify("create Gizmo");

    let view = f.outbox.view();
    assert_eq!(view.addition_errors.len(), 1);
    let error_id = view.addition_errors[0].id.clone();

    let temp_id = f.outbox.retry(&error_id).unwrap();
    assert_ne!(temp_id, "tmp-1");
    assert!(f.outbox.dead_letters().is_empty());
    assert_eq!(f.outbox.ledger().len(), 1);
    assert_eq!(f.outbox.retry(&error_id), None);

    f.pool.run_until_stalled();
    cr.verify("create Gizmo");
    f.gateway.release();
    f.pool.run_until_stalled();
    assert_eq!(f.outbox.entities().to_vec(), vec![product("1", "Gizmo", 5)]);
}

#[test]
fn dismiss_dead_letter() {
    let _cr = CallRecorder::new();
    let mut f = fixture(vec![widget()]);
    f.gateway.server.fail_next(GatewayError::new(404, "Not Found"));
    f.outbox.enqueue_deletion(widget());
    f.pool.run_until_stalled();
    f.gateway.release();
    f.pool.run_until_stalled();

    let id = f.outbox.dead_letters().borrow()[0].id.clone();
    assert!(f.outbox.dismiss(&id).is_some());
    assert!(f.outbox.view().data[0].meta.errors.is_empty());
    assert!(f.outbox.ledger().is_empty());
}

#[test]
fn dismiss_all_dead_letters() {
    let _cr = CallRecorder::new();
    let mut f = fixture(vec![widget(), product("2", "Gadget", 7)]);
    f.gateway.server.fail_next(GatewayError::new(404, "Not Found"));
    f.gateway.server.fail_next(GatewayError::new(404, "Not Found"));
    f.outbox.enqueue_deletion(widget());
    f.outbox.enqueue_deletion(product("2", "Gadget", 7));
    for _ in 0..2 {
        f.pool.run_until_stalled();
        f.gateway.release();
    }
    f.pool.run_until_stalled();
    assert_eq!(f.outbox.dead_letters().len(), 2);

    f.outbox.dismiss_all();
    assert!(f.outbox.dead_letters().is_empty());
    assert!(f.outbox.view().data.iter().all(|e| e.meta.errors.is_empty()));
}

#[test]
fn watch_is_notified_on_enqueue_and_settle() {
    let mut cr = CallRecorder::new();
    let mut f = fixture(vec![widget()]);
    let _s = f.outbox.watch(|view| {
        let meta = &view.data[0].meta;
        call!("deleting={} len={}", meta.is_deleting, view.data.len());
    });
    cr.verify("deleting=false len=1");

    f.outbox.enqueue_deletion(widget());
    cr.verify("deleting=true len=1");

    f.pool.run_until_stalled();
    cr.verify("deleting=true len=1");
    assert_eq!(f.gateway.held(), 1);
    drop(_s);
    f.gateway.release();
    f.pool.run_until_stalled();
    cr.verify(());
}

#[test]
fn subscriber_may_enqueue() {
    let _cr = CallRecorder::new();
    let mut f = fixture(vec![widget()]);
    let done = Rc::new(RefCell::new(false));
    let _s = f.outbox.subscribe({
        let outbox = f.outbox.clone();
        let done = done.clone();
        move || {
            if !done.replace(true) {
                outbox.enqueue_update(product("1", "Widget", 99));
            }
        }
    });
    f.outbox.enqueue_update(product("1", "Widget", 50));
    assert_eq!(f.outbox.ledger().len(), 2);
    f.pool.run_until_stalled();
    f.gateway.release();
    f.pool.run_until_stalled();
    f.gateway.release();
    f.pool.run_until_stalled();
    assert_eq!(f.outbox.entities().get("1"), Some(product("1", "Widget", 99)));
}

#[test]
fn request_log_tracks_outstanding_requests() {
    let _cr = CallRecorder::new();
    let mut pool = LocalPool::new();
    let gateway = HeldGateway::new(vec![widget()]);
    let log = RequestLog::new();
    let outbox = Outbox::<Product>::builder("products", gateway.clone())
        .entities(vec![widget()])
        .spawner(Spawner::from_local_spawn(pool.spawner()))
        .request_log(log.clone())
        .build();

    outbox.enqueue_update(product("1", "Widget", 20));
    assert!(log.is_empty());
    pool.run_until_stalled();
    let requests = log.for_feature("products");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, HttpMethod::Put);
    assert_eq!(requests[0].kind, ChangeKind::Update);
    assert_eq!(requests[0].body["price"], 20);

    gateway.release();
    pool.run_until_stalled();
    assert!(log.is_empty());
}

#[test]
fn sorting() {
    let f = fixture(vec![
        product("1", "b", 30),
        product("2", "a", 10),
        product("3", "c", 20),
    ]);
    let names = |outbox: &Outbox<Product>| -> Vec<String> {
        outbox.view().data.iter().map(|e| e.item.name.clone()).collect()
    };
    assert_eq!(names(&f.outbox), ["b", "a", "c"]);

    f.outbox
        .set_sorting(Sorting::by_key(|p: &Product| p.price, SortDirection::Asc));
    assert_eq!(names(&f.outbox), ["a", "c", "b"]);

    f.outbox.toggle_sort_direction();
    assert_eq!(names(&f.outbox), ["b", "c", "a"]);
}

#[test]
fn view_is_repeatable() {
    let f = fixture(vec![widget()]);
    f.outbox.enqueue_update(product("1", "Widget", 20));
    f.outbox.enqueue_addition("tmp-1", draft("Gizmo", 5));
    assert_eq!(f.outbox.view(), f.outbox.view());
}
