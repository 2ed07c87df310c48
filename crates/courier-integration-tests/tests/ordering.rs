//! Stage ordering, cancellation and discriminator filtering.

mod common;

use std::sync::Arc;

use courier_events::{Cancellable, EventBus, ListenerSpec, Order};
use courier_test::{CallLog, Guarded, Ping, Recorder, Tagged};

use common::{STRATEGIES, recording_bus};

fn spec(order: Order) -> ListenerSpec {
    ListenerSpec::new().with_order(order)
}

#[test]
fn test_stages_run_first_to_last_regardless_of_registration_order() {
    let bus = EventBus::new();
    let log = CallLog::new();
    for order in Order::ALL.iter().rev() {
        bus.listen(spec(*order), log.recorder::<Ping>(order.as_str()));
    }

    bus.post(&mut Ping::default());

    assert_eq!(log.entries(), vec!["first", "early", "normal", "late", "last"]);
}

#[test]
fn test_registration_order_kept_within_stage() {
    let bus = EventBus::new();
    let log = CallLog::new();
    bus.listen(spec(Order::Late), log.recorder::<Ping>("late-1"));
    bus.listen(spec(Order::Early), log.recorder::<Ping>("early-1"));
    bus.listen(spec(Order::Late), log.recorder::<Ping>("late-2"));
    bus.listen(spec(Order::Early), log.recorder::<Ping>("early-2"));
    bus.listen(spec(Order::Late), log.recorder::<Ping>("late-3"));

    bus.post(&mut Ping::default());

    assert_eq!(
        log.entries(),
        vec!["early-1", "early-2", "late-1", "late-2", "late-3"]
    );
}

#[test]
fn test_subscriber_and_closures_share_stages() {
    for strategy in STRATEGIES {
        let (bus, _) = recording_bus(strategy);
        let log = CallLog::new();
        bus.listen(spec(Order::Last), |ping: &mut Ping| ping.mark("closure:last"));
        bus.register(Arc::new(Recorder::new("r", log.clone()))).unwrap();
        bus.register_static::<Recorder>().unwrap();
        bus.listen(spec(Order::Normal), |ping: &mut Ping| ping.mark("closure:normal"));

        let mut ping = Ping::default();
        bus.post(&mut ping);

        assert_eq!(
            ping.seen,
            vec!["audit", "r:ping", "closure:normal", "closure:last"],
            "{strategy:?}"
        );
        assert_eq!(log.entries(), vec!["r:ping"]);
    }
}

#[test]
fn test_cancellation_in_earlier_stage_filters_later_stages() {
    let bus = EventBus::new();
    bus.listen(spec(Order::First), |g: &mut Guarded| {
        g.mark("cancel");
        g.set_cancelled(true);
    });
    bus.listen(spec(Order::Normal), |g: &mut Guarded| g.mark("normal"));
    bus.listen(spec(Order::Last).receiving_cancelled(), |g: &mut Guarded| {
        g.mark("monitor");
    });

    let mut guarded = Guarded::default();
    bus.post(&mut guarded);

    assert_eq!(guarded.seen, vec!["cancel", "monitor"]);
}

#[test]
fn test_uncancel_restores_delivery() {
    let bus = EventBus::new();
    bus.listen(spec(Order::First), |g: &mut Guarded| g.set_cancelled(true));
    bus.listen(spec(Order::Early), |g: &mut Guarded| g.mark("skipped"));
    bus.listen(spec(Order::Normal).receiving_cancelled(), |g: &mut Guarded| {
        g.set_cancelled(false);
    });
    bus.listen(spec(Order::Late), |g: &mut Guarded| g.mark("late"));

    let mut guarded = Guarded::default();
    bus.post(&mut guarded);

    assert_eq!(guarded.seen, vec!["late"]);
    assert!(!guarded.cancelled);
}

#[test]
fn test_precancelled_event_reaches_only_receive_cancelled() {
    let bus = EventBus::new();
    bus.listen(ListenerSpec::new(), |g: &mut Guarded| g.mark("plain"));
    bus.listen(ListenerSpec::new().receiving_cancelled(), |g: &mut Guarded| {
        g.mark("monitor");
    });

    let mut guarded = Guarded {
        cancelled: true,
        ..Guarded::default()
    };
    bus.post(&mut guarded);

    assert_eq!(guarded.seen, vec!["monitor"]);
}

#[test]
fn test_receive_cancelled_flag_ignored_for_non_cancellable_events() {
    let bus = EventBus::new();
    bus.listen(ListenerSpec::new(), |p: &mut Ping| p.mark("plain"));
    bus.listen(ListenerSpec::new().receiving_cancelled(), |p: &mut Ping| {
        p.mark("monitor");
    });

    let mut ping = Ping::default();
    bus.post(&mut ping);

    assert_eq!(ping.seen, vec!["plain", "monitor"]);
}

#[test]
fn test_generic_filter_combined_with_cancellation() {
    let bus = EventBus::new();
    bus.listen(
        spec(Order::First).with_generic::<String>(),
        |t: &mut Tagged| {
            t.mark("cancel");
            t.set_cancelled(true);
        },
    );
    bus.listen(spec(Order::Normal).with_generic::<String>(), |t: &mut Tagged| {
        t.mark("string");
    });
    bus.listen(
        spec(Order::Normal)
            .with_generic::<String>()
            .receiving_cancelled(),
        |t: &mut Tagged| t.mark("string:monitor"),
    );
    bus.listen(
        spec(Order::Normal).with_generic::<u32>().receiving_cancelled(),
        |t: &mut Tagged| t.mark("number:monitor"),
    );

    let mut strings = Tagged::of::<String>();
    bus.post(&mut strings);
    assert_eq!(strings.seen, vec!["cancel", "string:monitor"]);

    let mut numbers = Tagged::of::<u32>();
    bus.post(&mut numbers);
    assert_eq!(numbers.seen, vec!["number:monitor"]);
}

#[test]
fn test_unfiltered_listener_sees_every_tag() {
    let bus = EventBus::new();
    let log = CallLog::new();
    bus.listen(ListenerSpec::new(), log.recorder::<Tagged>("any"));

    bus.post(&mut Tagged::of::<String>());
    bus.post(&mut Tagged::of::<u32>());
    bus.post(&mut Tagged::untagged());

    assert_eq!(log.len(), 3);
}
