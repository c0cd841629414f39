use std::cell::RefCell;
use std::rc::Rc;
use tempo_scheduler::{Priority, Scheduler, Status, VirtualHost};

fn scheduler() -> (VirtualHost, Scheduler<VirtualHost>) {
    let host = VirtualHost::new();
    let scheduler = Scheduler::new(host.clone());
    (host, scheduler)
}

#[test]
fn test_default_level_is_normal() {
    let (_host, scheduler) = scheduler();
    assert_eq!(scheduler.current_priority_level(), Priority::Normal);
}

#[test]
fn test_run_with_priority_nests_and_restores() {
    let (_host, scheduler) = scheduler();

    let seen = scheduler.run_with_priority(Priority::UserBlocking, || {
        let outer = scheduler.current_priority_level();
        let inner = scheduler.run_with_priority(Priority::Idle, || scheduler.current_priority_level());
        (outer, inner, scheduler.current_priority_level())
    });

    assert_eq!(seen, (Priority::UserBlocking, Priority::Idle, Priority::UserBlocking));
    assert_eq!(scheduler.current_priority_level(), Priority::Normal);
}

#[test]
fn test_next_never_raises_priority() {
    let (_host, scheduler) = scheduler();

    for (ambient, expected) in [
        (Priority::Immediate, Priority::Normal),
        (Priority::UserBlocking, Priority::Normal),
        (Priority::Normal, Priority::Normal),
        (Priority::Low, Priority::Low),
        (Priority::Idle, Priority::Idle),
    ] {
        let level = scheduler.run_with_priority(ambient, || {
            scheduler.next(|| scheduler.current_priority_level())
        });
        assert_eq!(level, expected, "next() under {ambient}");
    }
}

#[test]
fn test_wrap_callback_restores_captured_level() {
    let (_host, scheduler) = scheduler();

    let mut wrapped = scheduler.run_with_priority(Priority::UserBlocking, || {
        let sch = scheduler.clone();
        scheduler.wrap_callback(move |x: u32| (x * 2, sch.current_priority_level()))
    });

    assert_eq!(wrapped(1), (2, Priority::UserBlocking));
    assert_eq!(scheduler.current_priority_level(), Priority::Normal);

    let from_idle = scheduler.run_with_priority(Priority::Idle, || wrapped(2));
    assert_eq!(from_idle, (4, Priority::UserBlocking));

    // Callable many times.
    assert_eq!(wrapped(3).0, 6);
}

#[test]
fn test_wrapped_callback_outlives_scheduler() {
    let (_host, scheduler) = scheduler();
    let mut wrapped = scheduler.wrap_callback(|x: i32| x + 1);
    drop(scheduler);
    assert_eq!(wrapped(41), 42);
}

#[test]
fn test_tasks_run_at_their_own_priority() {
    let (host, scheduler) = scheduler();
    let seen = Rc::new(RefCell::new(Vec::new()));

    for priority in [Priority::Low, Priority::UserBlocking] {
        let seen = seen.clone();
        let sch = scheduler.clone();
        scheduler.schedule_callback(priority, move |_| {
            seen.borrow_mut().push(sch.current_priority_level());
            Status::Done
        });
    }

    scheduler.run_with_priority(Priority::Idle, || host.run_until_idle());
    assert_eq!(*seen.borrow(), vec![Priority::UserBlocking, Priority::Low]);
    // The flush hands back whatever level was ambient when it started.
    assert_eq!(scheduler.current_priority_level(), Priority::Normal);
}

#[test]
fn test_callbacks_scheduled_from_a_task_inherit_nothing() {
    let (host, scheduler) = scheduler();
    let seen = Rc::new(RefCell::new(None));

    {
        let seen = seen.clone();
        let sch = scheduler.clone();
        scheduler.schedule_callback(Priority::Idle, move |_| {
            let handle = sch.schedule_callback(Priority::Immediate, |_| Status::Done);
            *seen.borrow_mut() = sch.task_info(&handle).map(|info| info.priority);
            Status::Done
        });
    }

    host.run_until_idle();
    assert_eq!(*seen.borrow(), Some(Priority::Immediate));
}

#[test]
fn test_priority_parsing() {
    assert_eq!("user-blocking".parse::<Priority>().unwrap(), Priority::UserBlocking);
    assert!("urgent".parse::<Priority>().is_err());
    assert_eq!(Priority::from_raw(42), Priority::Normal);
    assert_eq!(Priority::from_raw(5), Priority::Idle);
}
