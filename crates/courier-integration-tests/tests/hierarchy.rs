//! Supertype aggregation: projected views, chain order, diamonds.

mod common;

use std::sync::Arc;

use courier_events::{
    Cancellable, Event, EventBus, HandlerError, ListenerSpec, Method, Order, Subscriber,
    Supertype, TypeKey, handler_error,
};
use courier_test::{Base, CallLog, Derived};

use common::{STRATEGIES, recording_bus};

fn spec(order: Order) -> ListenerSpec {
    ListenerSpec::new().with_order(order)
}

#[test]
fn test_base_listener_receives_projected_view() {
    let bus = EventBus::new();
    bus.listen(ListenerSpec::new(), |base: &mut Base| base.seen.push("base".into()));
    bus.listen(ListenerSpec::new(), |d: &mut Derived| d.seen.push("derived".into()));

    let mut derived = Derived::default();
    bus.post(&mut derived);

    assert_eq!(derived.seen, vec!["derived"]);
    assert_eq!(derived.base.seen, vec!["base"]);
}

#[test]
fn test_posting_base_does_not_reach_derived_listeners() {
    let bus = EventBus::new();
    let log = CallLog::new();
    bus.listen(ListenerSpec::new(), log.recorder::<Derived>("derived"));
    bus.listen(ListenerSpec::new(), log.recorder::<Base>("base"));

    bus.post(&mut Base::default());

    assert_eq!(log.entries(), vec!["base"]);
}

#[test]
fn test_each_stage_completes_across_chain_before_next() {
    let bus = EventBus::new();
    let log = CallLog::new();
    bus.listen(spec(Order::Late), log.recorder::<Derived>("derived:late"));
    bus.listen(spec(Order::Normal), log.recorder::<Base>("base:normal"));
    bus.listen(spec(Order::Normal), log.recorder::<Derived>("derived:normal"));
    bus.listen(spec(Order::First), log.recorder::<Base>("base:first"));

    bus.post(&mut Derived::default());

    assert_eq!(
        log.entries(),
        vec!["base:first", "derived:normal", "base:normal", "derived:late"]
    );
}

#[test]
fn test_base_listener_registered_after_first_post() {
    let bus = EventBus::new();
    let log = CallLog::new();
    bus.post(&mut Derived::default());
    bus.listen(ListenerSpec::new(), log.recorder::<Base>("late-base"));

    bus.post(&mut Derived::default());

    assert_eq!(log.entries(), vec!["late-base"]);
}

struct BaseAuditor {
    log: CallLog,
}

impl BaseAuditor {
    fn on_base(&self, base: &mut Base) {
        self.log.record("auditor");
        base.seen.push("auditor".into());
    }
}

impl Subscriber for BaseAuditor {
    fn methods() -> Vec<Method> {
        vec![Method::instance("on_base", BaseAuditor::on_base).with_listener(ListenerSpec::new())]
    }
}

#[test]
fn test_subscriber_on_supertype_under_both_strategies() {
    for strategy in STRATEGIES {
        let (bus, failures) = recording_bus(strategy);
        let log = CallLog::new();
        bus.register(Arc::new(BaseAuditor { log: log.clone() })).unwrap();

        let mut derived = Derived::default();
        bus.post(&mut derived);

        assert_eq!(derived.base.seen, vec!["auditor"], "{strategy:?}");
        assert_eq!(failures.count(), 0, "{strategy:?}");
    }
}

// ---------------------------------------------------------------------------
// Capabilities live on the posted type, not on its supertype.
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Parcel {
    seen: Vec<&'static str>,
}
impl Event for Parcel {}

#[derive(Default)]
struct Shipment {
    parcel: Parcel,
    tag: Option<TypeKey>,
    cancelled: bool,
}

impl Shipment {
    fn tagged<T: 'static>() -> Self {
        Self {
            tag: Some(TypeKey::of::<T>()),
            ..Self::default()
        }
    }
}

impl AsMut<Parcel> for Shipment {
    fn as_mut(&mut self) -> &mut Parcel {
        &mut self.parcel
    }
}

impl Cancellable for Shipment {
    fn is_cancelled(&self) -> bool {
        self.cancelled
    }
    fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }
}

impl Event for Shipment {
    fn as_cancellable(&self) -> Option<&dyn Cancellable> {
        Some(self)
    }
    fn as_cancellable_mut(&mut self) -> Option<&mut dyn Cancellable> {
        Some(self)
    }
    fn generic_type(&self) -> Option<TypeKey> {
        self.tag
    }
    fn supertypes() -> Vec<Supertype> {
        vec![Supertype::of::<Self, Parcel>()]
    }
}

#[test]
fn test_cancelled_subtype_skips_supertype_listeners() {
    let bus = EventBus::new();
    bus.listen(spec(Order::First), |shipment: &mut Shipment| {
        shipment.cancelled = true;
    });
    bus.listen(spec(Order::Normal), |parcel: &mut Parcel| parcel.seen.push("skipped"));
    bus.listen(
        spec(Order::Normal).receiving_cancelled(),
        |parcel: &mut Parcel| parcel.seen.push("watcher"),
    );

    let mut shipment = Shipment::default();
    bus.post(&mut shipment);

    assert!(shipment.cancelled);
    assert_eq!(shipment.parcel.seen, vec!["watcher"]);
}

#[test]
fn test_supertype_discriminator_matches_posted_tag() {
    let bus = EventBus::new();
    bus.listen(
        ListenerSpec::new().with_generic::<String>(),
        |parcel: &mut Parcel| parcel.seen.push("string"),
    );
    bus.listen(
        ListenerSpec::new().with_generic::<u32>(),
        |parcel: &mut Parcel| parcel.seen.push("u32"),
    );

    let mut shipment = Shipment::tagged::<String>();
    bus.post(&mut shipment);
    assert_eq!(shipment.parcel.seen, vec!["string"]);

    let mut untagged = Shipment::default();
    bus.post(&mut untagged);
    assert!(untagged.parcel.seen.is_empty());
}

#[test]
fn test_supertype_failure_reported_with_its_own_registry() {
    let (bus, failures) = recording_bus(STRATEGIES[0]);
    bus.listen(ListenerSpec::new(), |_: &mut Base| -> Result<(), HandlerError> {
        Err(handler_error("base broke"))
    });

    bus.post(&mut Derived::default());

    let recorded = failures.failures();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].list, TypeKey::of::<Base>());
    assert_eq!(recorded[0].event, TypeKey::of::<Derived>());
}

// ---------------------------------------------------------------------------
// Diamond: Bottom -> (Left, Right) -> Top
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Top {
    hits: u32,
}
impl Event for Top {}

#[derive(Default)]
struct Left {
    top: Top,
}
impl AsMut<Top> for Left {
    fn as_mut(&mut self) -> &mut Top {
        &mut self.top
    }
}
impl Event for Left {
    fn supertypes() -> Vec<Supertype> {
        vec![Supertype::of::<Self, Top>()]
    }
}

#[derive(Default)]
struct Right {
    top: Top,
}
impl AsMut<Top> for Right {
    fn as_mut(&mut self) -> &mut Top {
        &mut self.top
    }
}
impl Event for Right {
    fn supertypes() -> Vec<Supertype> {
        vec![Supertype::of::<Self, Top>()]
    }
}

#[derive(Default)]
struct Bottom {
    left: Left,
    right: Right,
}
impl AsMut<Left> for Bottom {
    fn as_mut(&mut self) -> &mut Left {
        &mut self.left
    }
}
impl AsMut<Right> for Bottom {
    fn as_mut(&mut self) -> &mut Right {
        &mut self.right
    }
}
impl Event for Bottom {
    fn supertypes() -> Vec<Supertype> {
        vec![
            Supertype::of::<Self, Left>(),
            Supertype::of::<Self, Right>(),
        ]
    }
}

#[test]
fn test_diamond_visits_shared_ancestor_once_in_declaration_order() {
    let bus = EventBus::new();
    let log = CallLog::new();
    bus.listen(ListenerSpec::new(), log.recorder::<Top>("top"));
    bus.listen(ListenerSpec::new(), log.recorder::<Right>("right"));
    bus.listen(ListenerSpec::new(), log.recorder::<Left>("left"));
    bus.listen(ListenerSpec::new(), log.recorder::<Bottom>("bottom"));
    bus.listen(ListenerSpec::new(), |top: &mut Top| top.hits += 1);

    let mut bottom = Bottom::default();
    bus.post(&mut bottom);

    assert_eq!(log.entries(), vec!["bottom", "left", "top", "right"]);
    // The shared ancestor sees the view through the first path only.
    assert_eq!(bottom.left.top.hits, 1);
    assert_eq!(bottom.right.top.hits, 0);
}

#[test]
fn test_chain_reports_links() {
    let bus = EventBus::new();
    let chain = bus.listeners::<Bottom>().chain();

    let types: Vec<&str> = chain
        .iter()
        .map(|link| link.list().event_type().key().name())
        .collect();
    assert_eq!(types.len(), 4);
    assert!(types[0].ends_with("Bottom"));
    assert!(types[1].ends_with("Left"));
    assert!(types[2].ends_with("Top"));
    assert!(types[3].ends_with("Right"));
    assert_eq!(bus.registry_count(), 4);
}
