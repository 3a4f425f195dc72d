use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use cmix_dm::{
    CallbackRouter, DmEvent, EventEnvelope, HandlerSet, Reply, RouterCapabilities, RouterResult,
    SchemaGeneration, TextReceived,
};

const WAIT: Duration = Duration::from_secs(5);

fn text(instance_id: i32) -> EventEnvelope {
    EventEnvelope::new(instance_id, DmEvent::TextReceived(TextReceived::default()))
}

#[test]
fn blocked_handler_does_not_stall_other_instances_or_the_registry() {
    let router = Arc::new(CallbackRouter::new(RouterCapabilities::all()));

    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let entered_tx = Mutex::new(entered_tx);
    let release_rx = Mutex::new(release_rx);
    router
        .register(
            1,
            Arc::new(HandlerSet::new().on_text_received(move |_, _| {
                entered_tx.lock().expect("entered lock").send(()).expect("signal entry");
                release_rx.lock().expect("release lock").recv_timeout(WAIT).expect("release");
                100
            })),
        )
        .expect("register blocking instance");
    router
        .register(2, Arc::new(HandlerSet::new().on_text_received(|_, _| 200)))
        .expect("register free instance");

    let blocked = {
        let router = Arc::clone(&router);
        thread::spawn(move || router.dispatch(&text(1)))
    };
    entered_rx.recv_timeout(WAIT).expect("handler for instance 1 entered");

    // Instance 1's handler is parked; everything below must still complete.
    assert_eq!(router.dispatch(&text(2)), RouterResult::Delivered(Reply::Status(200)));
    router.register(3, Arc::new(HandlerSet::new())).expect("register while blocked");
    router.deregister(3).expect("deregister while blocked");
    assert_eq!(router.registry().instance_ids(), vec![1, 2]);

    release_tx.send(()).expect("release handler");
    let result = blocked.join().expect("blocked dispatcher thread");
    assert_eq!(result, RouterResult::Delivered(Reply::Status(100)));
}

#[test]
fn deregistration_during_dispatch_finishes_the_in_flight_event() {
    let router = Arc::new(CallbackRouter::new(RouterCapabilities::all()));
    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let entered_tx = Mutex::new(entered_tx);
    let release_rx = Mutex::new(release_rx);
    router
        .register(
            5,
            Arc::new(HandlerSet::new().on_text_received(move |_, _| {
                entered_tx.lock().expect("entered lock").send(()).expect("signal entry");
                release_rx.lock().expect("release lock").recv_timeout(WAIT).expect("release");
                1
            })),
        )
        .expect("register");

    let in_flight = {
        let router = Arc::clone(&router);
        thread::spawn(move || router.dispatch(&text(5)))
    };
    entered_rx.recv_timeout(WAIT).expect("handler entered");
    router.deregister(5).expect("deregister mid-dispatch");

    release_tx.send(()).expect("release handler");
    assert_eq!(
        in_flight.join().expect("dispatcher thread"),
        RouterResult::Delivered(Reply::Status(1))
    );
    assert_eq!(router.dispatch(&text(5)), RouterResult::DroppedNoInstance { instance_id: 5 });
}

#[test]
fn parallel_dispatch_counts_every_event() {
    let router = Arc::new(CallbackRouter::new(RouterCapabilities::all()));
    for id in 0..4 {
        router
            .register(id, Arc::new(HandlerSet::new().on_text_received(move |instance, _| {
                i64::from(instance)
            })))
            .expect("register");
    }

    let workers: Vec<_> = (0..4)
        .map(|id| {
            let router = Arc::clone(&router);
            thread::spawn(move || {
                for _ in 0..250 {
                    assert_eq!(
                        router.dispatch(&text(id)),
                        RouterResult::Delivered(Reply::Status(i64::from(id)))
                    );
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker thread");
    }
    assert_eq!(router.stats().delivered, 1_000);
}

#[test]
fn replacing_the_process_table_never_leaves_a_gap() {
    let router = Arc::new(CallbackRouter::for_generation(SchemaGeneration::V2));
    router.replace_implicit(Arc::new(HandlerSet::new().on_text_received(|_, _| 1)));

    let writers: Vec<_> = (0..4)
        .map(|writer| {
            let router = Arc::clone(&router);
            thread::spawn(move || {
                for _ in 0..500 {
                    let status = 10 + writer;
                    let handlers = HandlerSet::new().on_text_received(move |_, _| status);
                    router.replace_implicit(Arc::new(handlers));
                }
            })
        })
        .collect();
    let reader = {
        let router = Arc::clone(&router);
        thread::spawn(move || {
            (0..5_000).filter(|id| !router.dispatch(&text(*id)).is_delivered()).count()
        })
    };

    for writer in writers {
        writer.join().expect("writer thread");
    }
    assert_eq!(reader.join().expect("reader thread"), 0);
    assert_eq!(router.stats().dropped_no_instance, 0);
    assert_eq!(router.registry().len(), 1);
}
