use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;
use vizij_timeline_core::{
    Clock, ClockHost, HostQuirks, Keyframe, ManualHost, ManualTarget, Timeline, TimelineConfig,
    TimelineError, Timing,
};

fn timeline() -> Timeline<ManualHost> {
    let _ = env_logger::builder().is_test(true).try_init();
    Timeline::new(ManualHost::new()).expect("manual host supports clocks")
}

fn fade() -> Vec<Keyframe> {
    vec![
        Keyframe::new().with("opacity", 0.0),
        Keyframe::new().with("opacity", 1.0),
    ]
}

type Log = Rc<RefCell<Vec<String>>>;

fn record(log: &Log, label: &str) -> impl FnOnce(&mut Timeline<ManualHost>) + 'static {
    let log = log.clone();
    let label = label.to_string();
    move |_| log.borrow_mut().push(label)
}

#[test]
fn construction_requires_clock_support() {
    match Timeline::new(ManualHost::unsupported()) {
        Err(TimelineError::Precondition { .. }) => {}
        other => panic!("expected precondition error, got {other:?}"),
    }
}

#[test]
fn config_sets_initial_rate() {
    let cfg = TimelineConfig {
        initial_playback_rate: 2.0,
        ..TimelineConfig::default()
    };
    let mut tl = Timeline::with_config(ManualHost::new(), cfg).unwrap();
    assert_eq!(tl.playback_rate(), 2.0);
    tl.advance(5.0);
    assert_relative_eq!(tl.current_time(), 10.0);
}

#[test]
fn scheduled_child_keeps_its_schedule_time_offset() {
    let mut tl = timeline();
    let el = ManualTarget::from("box");

    let past = tl.schedule(-50.0, &el, &fade(), 200.0).unwrap();
    assert_eq!(past.current_time(), Some(50.0));

    tl.set_current_time(100.0);
    let later = tl.schedule(40.0, &el, &fade(), 200.0).unwrap();
    assert_eq!(later.current_time(), Some(60.0));
    assert_eq!(later.timing(), Timing::from(200.0));
    assert_eq!(later.target(), el);

    // offset = 100 - 40, fixed when scheduled.
    tl.set_current_time(130.0);
    assert_eq!(later.current_time(), Some(190.0));
    assert_eq!(past.current_time(), Some(180.0));

    tl.set_current_time(0.0);
    assert_eq!(later.current_time(), Some(60.0));
}

#[test]
fn seeks_propagate_offsets_to_every_child() {
    let mut tl = timeline();
    let el = ManualTarget::from("box");
    let starts = [0.0, 25.0, -10.0, 300.0];
    let children: Vec<_> = starts
        .iter()
        .map(|&when| tl.schedule(when, &el, &fade(), 1000.0).unwrap())
        .collect();

    for t in [10.0, 250.0, 5.0, 40.0] {
        tl.set_current_time(t);
        assert_eq!(tl.current_time(), t);
        for (child, when) in children.iter().zip(starts) {
            assert_eq!(child.current_time(), Some(t - when));
        }
    }
}

#[test]
fn playback_rate_is_mirrored_onto_children() {
    let mut tl = timeline();
    let el = ManualTarget::from("box");
    let a = tl.schedule(0.0, &el, &fade(), 1000.0).unwrap();
    let b = tl.schedule(-5.0, &el, &fade(), 1000.0).unwrap();

    tl.set_playback_rate(2.0);
    assert_eq!(tl.playback_rate(), 2.0);
    assert_eq!(a.playback_rate(), 2.0);
    assert_eq!(b.playback_rate(), 2.0);

    let c = tl.schedule(0.0, &el, &fade(), 1000.0).unwrap();
    assert_eq!(c.playback_rate(), 2.0);

    tl.advance(10.0);
    assert_relative_eq!(tl.current_time(), 20.0);
    assert_eq!(a.current_time(), Some(20.0));
    assert_eq!(b.current_time(), Some(25.0));
}

#[test]
fn fallback_time_covers_unresolved_anchor_after_rate_change() {
    let host = ManualHost::with_quirks(HostQuirks {
        invalidate_time_on_rate_change: true,
    });
    let mut tl = Timeline::new(host).unwrap();
    let child = tl
        .schedule(0.0, &ManualTarget::from("box"), &fade(), 1000.0)
        .unwrap();

    tl.advance(40.0);
    tl.set_playback_rate(0.5);
    assert_eq!(tl.current_time(), 40.0);
    assert_eq!(child.current_time(), None);

    tl.advance(10.0);
    assert_relative_eq!(tl.current_time(), 45.0);
    assert_eq!(child.current_time(), Some(45.0));
}

#[test]
fn calls_fire_in_time_then_registration_order_exactly_once() {
    let mut tl = timeline();
    let log: Log = Rc::default();
    tl.call(5.0, record(&log, "5")).unwrap();
    tl.call(2.0, record(&log, "2 first")).unwrap();
    tl.call(8.0, record(&log, "8")).unwrap();
    tl.call(2.0, record(&log, "2 second")).unwrap();
    assert_eq!(tl.pending_call_times(), vec![2.0, 2.0, 5.0, 8.0]);

    tl.set_current_time(10.0);
    assert_eq!(*log.borrow(), vec!["2 first", "2 second", "5", "8"]);
    assert_eq!(tl.pending_calls_len(), 0);

    tl.set_current_time(20.0);
    assert_eq!(tl.advance(100.0), 0);
    assert_eq!(log.borrow().len(), 4);
}

#[test]
fn calls_in_the_past_are_rejected_without_mutation() {
    let mut tl = timeline();
    tl.set_current_time(10.0);
    tl.call(12.0, |_| {}).unwrap();
    let children = tl.children_len();

    let err = tl.call(4.0, |_| {}).unwrap_err();
    assert_eq!(
        err,
        TimelineError::InvalidSchedule {
            when: 4.0,
            behind: 6.0
        }
    );
    assert_eq!(tl.pending_call_times(), vec![12.0]);
    assert_eq!(tl.children_len(), children);
}

#[test]
fn non_finite_times_are_rejected() {
    let mut tl = timeline();
    assert!(matches!(
        tl.call(f64::NAN, |_| {}),
        Err(TimelineError::InvalidTime { .. })
    ));
    assert!(matches!(
        tl.schedule(f64::INFINITY, &ManualTarget::from("x"), &[], 10.0),
        Err(TimelineError::InvalidTime { .. })
    ));
    assert_eq!(tl.children_len(), 0);
}

#[test]
fn backward_seek_never_refires_consumed_calls() {
    let mut tl = timeline();
    let log: Log = Rc::default();
    tl.call(10.0, record(&log, "ten")).unwrap();

    tl.set_current_time(15.0);
    assert_eq!(log.borrow().len(), 1);

    tl.set_current_time(5.0);
    tl.set_current_time(12.0);
    tl.advance(50.0);
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn backward_seek_does_not_fire_pending_calls() {
    let mut tl = timeline();
    let log: Log = Rc::default();
    tl.set_current_time(50.0);
    tl.call(60.0, record(&log, "sixty")).unwrap();

    tl.set_current_time(40.0);
    assert!(log.borrow().is_empty());
    tl.set_current_time(61.0);
    assert_eq!(*log.borrow(), vec!["sixty"]);
}

#[test]
fn proxy_finish_wakes_calls_without_seeking() {
    let mut tl = timeline();
    let log: Log = Rc::default();
    tl.call(100.0, record(&log, "hundred")).unwrap();

    assert_eq!(tl.advance(60.0), 0);
    assert!(log.borrow().is_empty());
    assert_eq!(tl.advance(50.0), 1);
    assert_eq!(*log.borrow(), vec!["hundred"]);
    assert_relative_eq!(tl.current_time(), 110.0);
}

#[test]
fn call_at_current_time_fires_on_next_finish_delivery() {
    let mut tl = timeline();
    tl.set_current_time(30.0);
    let log: Log = Rc::default();
    tl.call(30.0, record(&log, "now")).unwrap();
    assert!(log.borrow().is_empty());
    assert_eq!(tl.deliver_finished(), 1);
    assert_eq!(*log.borrow(), vec!["now"]);
}

#[test]
fn spent_proxies_are_retired() {
    let mut tl = timeline();
    tl.call(5.0, |_| {}).unwrap();
    tl.call(9.0, |_| {}).unwrap();
    assert_eq!(tl.children_len(), 2);

    tl.set_current_time(6.0);
    assert_eq!(tl.children_len(), 1);
    tl.set_current_time(9.0);
    assert_eq!(tl.children_len(), 0);
}

#[test]
fn remove_all_clears_children_and_calls() {
    let mut tl = timeline();
    let el = ManualTarget::from("box");
    let log: Log = Rc::default();
    let a = tl.schedule(0.0, &el, &fade(), 1000.0).unwrap();
    let b = tl.schedule(10.0, &el, &fade(), 1000.0).unwrap();
    tl.call(30.0, record(&log, "thirty")).unwrap();

    tl.remove(None).unwrap();
    assert_eq!(tl.children_len(), 0);
    assert_eq!(tl.pending_calls_len(), 0);
    assert!(a.is_cancelled() && b.is_cancelled());

    tl.set_current_time(50.0);
    tl.advance(50.0);
    assert!(log.borrow().is_empty());
    assert_eq!(a.current_time(), None);
    // The anchor keeps running.
    assert_relative_eq!(tl.current_time(), 100.0);
}

#[test]
fn targeted_remove_leaves_other_children_tracking() {
    let mut tl = timeline();
    let el = ManualTarget::from("box");
    let a = tl.schedule(0.0, &el, &fade(), 1000.0).unwrap();
    let b = tl.schedule(20.0, &el, &fade(), 1000.0).unwrap();

    tl.remove(Some(&a)).unwrap();
    assert!(a.is_cancelled());
    assert!(!b.is_cancelled());
    assert_eq!(tl.children_len(), 1);

    tl.set_current_time(70.0);
    assert_eq!(b.current_time(), Some(50.0));
    assert_eq!(a.current_time(), None);
}

#[test]
fn remove_rejects_handles_without_cancel() {
    let mut tl = timeline();
    let el = ManualTarget::from("box");
    let a = tl.schedule(0.0, &el, &fade(), 1000.0).unwrap().without_cancel();

    let err = tl.remove(Some(&a)).unwrap_err();
    assert_eq!(err.category(), "argument");
    assert_eq!(tl.children_len(), 1);
    assert!(!a.is_cancelled());
}

#[test]
fn removing_an_untracked_clock_only_cancels_it() {
    let mut tl = timeline();
    let el = ManualTarget::from("box");
    tl.schedule(0.0, &el, &fade(), 1000.0).unwrap();

    let mut other = ManualHost::new();
    let foreign = other.create_clock(&el, &[], &Timing::from(10.0)).unwrap();
    tl.remove(Some(&foreign)).unwrap();
    assert!(foreign.is_cancelled());
    assert_eq!(tl.children_len(), 1);
}

#[test]
fn calls_added_during_a_sweep_wait_for_the_next_forward_motion() {
    let mut tl = timeline();
    let log: Log = Rc::default();
    let inner = log.clone();
    tl.call(10.0, move |tl: &mut Timeline<ManualHost>| {
        inner.borrow_mut().push("outer".into());
        let again = inner.clone();
        tl.call(10.0, move |_| again.borrow_mut().push("inner".into()))
            .unwrap();
    })
    .unwrap();

    tl.set_current_time(10.0);
    assert_eq!(*log.borrow(), vec!["outer"]);
    assert_eq!(tl.pending_calls_len(), 1);

    tl.set_current_time(11.0);
    assert_eq!(*log.borrow(), vec!["outer", "inner"]);
}

#[test]
fn remove_inside_a_callback_stops_the_sweep() {
    let mut tl = timeline();
    let log: Log = Rc::default();
    tl.call(1.0, record(&log, "one")).unwrap();
    let inner = log.clone();
    tl.call(2.0, move |tl: &mut Timeline<ManualHost>| {
        inner.borrow_mut().push("two".into());
        tl.remove(None).unwrap();
    })
    .unwrap();
    tl.call(3.0, record(&log, "three")).unwrap();

    tl.set_current_time(5.0);
    assert_eq!(*log.borrow(), vec!["one", "two"]);
    assert_eq!(tl.pending_calls_len(), 0);
    assert_eq!(tl.children_len(), 0);
}

#[test]
fn callbacks_can_schedule_players() {
    let mut tl = timeline();
    let spawned: Rc<RefCell<Option<vizij_timeline_core::ManualClock>>> = Rc::default();
    let slot = spawned.clone();
    tl.call(10.0, move |tl: &mut Timeline<ManualHost>| {
        let clock = tl
            .schedule(10.0, &ManualTarget::from("late"), &fade(), 500.0)
            .unwrap();
        *slot.borrow_mut() = Some(clock);
    })
    .unwrap();

    tl.set_current_time(10.0);
    let clock = spawned.borrow().clone().expect("callback ran");
    assert_eq!(clock.current_time(), Some(0.0));
    assert_eq!(clock.steps(), fade());

    tl.set_current_time(20.0);
    assert_eq!(clock.current_time(), Some(20.0));
}

#[test]
fn backward_seek_inside_a_callback_holds_back_later_calls() {
    let mut tl = timeline();
    let fired_at: Rc<RefCell<Vec<f64>>> = Rc::default();
    tl.call(1.0, |tl: &mut Timeline<ManualHost>| tl.set_current_time(0.0))
        .unwrap();
    let seen = fired_at.clone();
    tl.call(5.0, move |tl: &mut Timeline<ManualHost>| {
        seen.borrow_mut().push(tl.current_time())
    })
    .unwrap();

    tl.set_current_time(10.0);
    assert!(fired_at.borrow().is_empty());
    assert_eq!(tl.pending_call_times(), vec![5.0]);

    tl.set_current_time(6.0);
    assert_eq!(*fired_at.borrow(), vec![6.0]);
}

#[test]
fn non_finite_seeks_are_ignored() {
    let mut tl = timeline();
    let child = tl
        .schedule(0.0, &ManualTarget::from("box"), &fade(), 1000.0)
        .unwrap();
    tl.set_current_time(25.0);

    tl.set_current_time(f64::NAN);
    tl.set_current_time(f64::INFINITY);
    assert_eq!(tl.current_time(), 25.0);
    assert_eq!(child.current_time(), Some(25.0));
}

#[test]
fn proxies_stop_being_watched_once_retired_or_removed() {
    let mut tl = timeline();
    tl.call(5.0, |_| {}).unwrap();
    tl.call(9.0, |_| {}).unwrap();
    assert_eq!(tl.host().watched_len(), 2);

    tl.set_current_time(6.0);
    assert_eq!(tl.host().watched_len(), 1);

    tl.remove(None).unwrap();
    assert_eq!(tl.host().watched_len(), 0);
}
