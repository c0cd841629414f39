use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tempo_scheduler::{Priority, Scheduler, Status, TaskHandle, VirtualHost};

fn step(count: Rc<Cell<u32>>, host: VirtualHost, limit: u32) -> Status {
    count.set(count.get() + 1);
    host.advance_time(10.0);
    if count.get() > limit {
        Status::Done
    } else {
        Status::continue_with(move |_| step(count, host, limit))
    }
}

#[test]
fn test_continuation_runs_across_slices() {
    let host = VirtualHost::new();
    let scheduler = Scheduler::new(host.clone());
    let count = Rc::new(Cell::new(0));

    let c = count.clone();
    let h = host.clone();
    scheduler.schedule_callback(Priority::Normal, move |_| step(c, h, 5));

    // Each invocation takes 10ms, so two fit in a 16ms frame.
    assert!(host.run_next());
    assert_eq!(count.get(), 2);
    assert_eq!(host.pending_deferred(), 1);
    assert_eq!(scheduler.ready_len(), 1);

    host.run_until_idle();
    assert_eq!(count.get(), 6);
    assert_eq!(host.deferred_runs(), 3);
    assert_eq!(scheduler.ready_len(), 0);
    assert_eq!(host.pending_deferred(), 0);
}

#[test]
fn test_continuation_keeps_its_queue_position() {
    let host = VirtualHost::new();
    let scheduler = Scheduler::new(host.clone());
    let log = Rc::new(RefCell::new(Vec::new()));

    {
        let log = log.clone();
        scheduler.schedule_callback(Priority::Low, move |_| {
            log.borrow_mut().push("low");
            Status::Done
        });
    }
    {
        let log = log.clone();
        let sch = scheduler.clone();
        scheduler.schedule_callback(Priority::Normal, move |_| {
            log.borrow_mut().push("normal-1");
            let inner_log = log.clone();
            sch.schedule_callback(Priority::UserBlocking, move |_| {
                inner_log.borrow_mut().push("user-blocking");
                Status::Done
            });
            Status::continue_with(move |_| {
                log.borrow_mut().push("normal-2");
                Status::Done
            })
        });
    }

    host.run_until_idle();
    assert_eq!(
        *log.borrow(),
        vec!["normal-1", "user-blocking", "normal-2", "low"]
    );
}

#[test]
fn test_unexpired_tasks_yield_each_frame() {
    let host = VirtualHost::new();
    let scheduler = Scheduler::new(host.clone());
    let ran = Rc::new(Cell::new(0));

    for _ in 0..3 {
        let ran = ran.clone();
        let h = host.clone();
        scheduler.schedule_callback(Priority::Normal, move |_| {
            h.advance_time(20.0);
            ran.set(ran.get() + 1);
            Status::Done
        });
    }

    assert!(host.run_next());
    assert_eq!(ran.get(), 1);
    host.run_until_idle();
    assert_eq!(ran.get(), 3);
    assert_eq!(host.deferred_runs(), 3);
}

#[test]
fn test_expired_tasks_ignore_the_deadline() {
    let host = VirtualHost::new();
    let scheduler = Scheduler::new(host.clone());
    let timeouts = Rc::new(RefCell::new(Vec::new()));

    for _ in 0..3 {
        let timeouts = timeouts.clone();
        let h = host.clone();
        scheduler.schedule_callback(Priority::Immediate, move |did_timeout| {
            h.advance_time(20.0);
            timeouts.borrow_mut().push(did_timeout);
            Status::Done
        });
    }

    host.run_until_idle();
    assert_eq!(*timeouts.borrow(), vec![true, true, true]);
    assert_eq!(host.deferred_runs(), 1);
}

#[test]
fn test_did_timeout_reflects_expiration() {
    let host = VirtualHost::new();
    let scheduler = Scheduler::new(host.clone());
    let seen = Rc::new(RefCell::new(Vec::new()));

    {
        let seen = seen.clone();
        scheduler.schedule_callback(Priority::Normal, move |did_timeout| {
            seen.borrow_mut().push(("normal", did_timeout));
            Status::Done
        });
    }
    {
        let seen = seen.clone();
        scheduler.schedule_callback(Priority::UserBlocking, move |did_timeout| {
            seen.borrow_mut().push(("user-blocking", did_timeout));
            Status::Done
        });
    }

    // The host was busy past the user-blocking timeout.
    host.advance_time(300.0);
    host.run_until_idle();
    assert_eq!(
        *seen.borrow(),
        vec![("user-blocking", true), ("normal", false)]
    );
}

#[test]
fn test_cancelled_task_is_skipped() {
    let host = VirtualHost::new();
    let scheduler = Scheduler::new(host.clone());
    let log = Rc::new(RefCell::new(Vec::new()));

    let mut handles = Vec::new();
    for name in ["A", "B", "C"] {
        let log = log.clone();
        handles.push(scheduler.schedule_callback(Priority::Normal, move |_| {
            log.borrow_mut().push(name);
            Status::Done
        }));
    }

    scheduler.cancel_callback(&handles[1]);
    scheduler.cancel_callback(&handles[1]);
    assert!(scheduler.task_info(&handles[1]).unwrap().cancelled);
    // Cancellation is lazy: the node stays queued.
    assert_eq!(scheduler.ready_len(), 3);

    host.run_until_idle();
    assert_eq!(*log.borrow(), vec!["A", "C"]);
    assert_eq!(scheduler.ready_len(), 0);

    // Handles of finished tasks are inert.
    scheduler.cancel_callback(&handles[0]);
    assert!(scheduler.task_info(&handles[0]).is_none());
}

#[test]
fn test_cancelled_head_is_still_first_node() {
    let host = VirtualHost::new();
    let scheduler = Scheduler::new(host.clone());

    let head = scheduler.schedule_callback(Priority::UserBlocking, |_| Status::Done);
    scheduler.schedule_callback(Priority::Normal, |_| Status::Done);
    scheduler.cancel_callback(&head);

    assert_eq!(scheduler.first_callback_node(), Some(head));
    host.run_until_idle();
    assert!(scheduler.first_callback_node().is_none());
}

#[test]
fn test_continuation_survives_cancelling_the_running_task() {
    let host = VirtualHost::new();
    let scheduler = Scheduler::new(host.clone());
    let calls = Rc::new(Cell::new(0));
    let own: Rc<Cell<Option<TaskHandle>>> = Rc::new(Cell::new(None));

    let handle = {
        let calls = calls.clone();
        let own = own.clone();
        let sch = scheduler.clone();
        scheduler.schedule_callback(Priority::Normal, move |_| {
            calls.set(calls.get() + 1);
            if let Some(handle) = own.get() {
                sch.cancel_callback(&handle);
            }
            let calls = calls.clone();
            Status::continue_with(move |_| {
                calls.set(calls.get() + 1);
                Status::Done
            })
        })
    };
    own.set(Some(handle));

    host.run_until_idle();
    // The returned continuation replaces the nulled callback and still runs.
    assert_eq!(calls.get(), 2);
    assert_eq!(scheduler.ready_len(), 0);
}

#[test]
fn test_pause_and_continue() {
    let host = VirtualHost::new();
    let scheduler = Scheduler::new(host.clone());
    let ran = Rc::new(Cell::new(false));

    scheduler.pause_execution();
    assert!(scheduler.is_paused());

    let r = ran.clone();
    scheduler.schedule_callback(Priority::Normal, move |_| {
        r.set(true);
        Status::Done
    });

    host.run_until_idle();
    assert!(!ran.get());
    assert_eq!(scheduler.ready_len(), 1);

    scheduler.continue_execution();
    assert!(!scheduler.is_paused());
    assert_eq!(host.pending_deferred(), 1);

    host.run_until_idle();
    assert!(ran.get());
}

#[test]
fn test_pausing_from_a_task_stops_the_loop() {
    let host = VirtualHost::new();
    let scheduler = Scheduler::new(host.clone());
    let log = Rc::new(RefCell::new(Vec::new()));

    {
        let log = log.clone();
        let sch = scheduler.clone();
        scheduler.schedule_callback(Priority::Normal, move |_| {
            log.borrow_mut().push("first");
            sch.pause_execution();
            Status::Done
        });
    }
    {
        let log = log.clone();
        scheduler.schedule_callback(Priority::Normal, move |_| {
            log.borrow_mut().push("second");
            Status::Done
        });
    }

    host.run_until_idle();
    assert_eq!(*log.borrow(), vec!["first"]);

    scheduler.continue_execution();
    host.run_until_idle();
    assert_eq!(*log.borrow(), vec!["first", "second"]);
}

#[test]
fn test_idle_scheduler_requests_nothing() {
    let host = VirtualHost::new();
    let scheduler = Scheduler::new(host.clone());

    // Initially idle
    assert_eq!(scheduler.ready_len(), 0);
    assert_eq!(scheduler.delayed_len(), 0);
    assert_eq!(host.pending_deferred(), 0);
    assert_eq!(host.pending_timeouts(), 0);

    scheduler.schedule_callback(Priority::Normal, |_| Status::Done);
    scheduler.schedule_callback(Priority::Normal, |_| Status::Done);
    // One activation serves both tasks.
    assert_eq!(host.pending_deferred(), 1);

    host.run_until_idle();
    assert_eq!(host.pending_deferred(), 0);
    assert_eq!(host.pending_timeouts(), 0);
}
