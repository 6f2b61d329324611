use crate::net::LinkId;
use crate::qos::{LinkShaper, QueueConfig, ServiceClass};

const CAPACITY: u64 = 100_000_000;

fn queue(class: ServiceClass, min: u64, max: Option<u64>, priority: u32) -> QueueConfig {
    QueueConfig {
        link: LinkId(0),
        class,
        queue_id: 10 * (priority as u16),
        min_rate_bps: min,
        max_rate_bps: max,
        priority,
    }
}

fn shaper() -> LinkShaper {
    let mut s = LinkShaper::new(CAPACITY);
    s.install(queue(ServiceClass::Iot, 20_000_000, None, 3));
    s.install(queue(ServiceClass::Web, 50_000_000, Some(60_000_000), 1));
    s.install(queue(ServiceClass::Video, 20_000_000, None, 2));
    s
}

#[test]
fn unshaped_link_splits_evenly() {
    let s = LinkShaper::new(CAPACITY);
    assert!(!s.is_shaping());
    let rates = s.rates(&[ServiceClass::Web, ServiceClass::Iot]);
    assert_eq!(rates[&ServiceClass::Web], 50_000_000);
    assert_eq!(rates[&ServiceClass::Iot], 50_000_000);
    assert!(s.rates(&[]).is_empty());
}

#[test]
fn install_keeps_priority_order() {
    let s = shaper();
    let order: Vec<ServiceClass> = s.queues().iter().map(|q| q.class).collect();
    assert_eq!(order, [ServiceClass::Web, ServiceClass::Video, ServiceClass::Iot]);
}

#[test]
fn spare_capacity_is_lent_by_priority_up_to_ceiling() {
    let rates = shaper().rates(&ServiceClass::ALL);
    // min: 50 + 20 + 20, spare 10 -> web (ceiling 60) takes it all
    assert_eq!(rates[&ServiceClass::Web], 60_000_000);
    assert_eq!(rates[&ServiceClass::Video], 20_000_000);
    assert_eq!(rates[&ServiceClass::Iot], 20_000_000);
}

#[test]
fn lone_class_borrows_whole_link_without_ceiling() {
    let s = shaper();
    assert_eq!(s.rates(&[ServiceClass::Iot])[&ServiceClass::Iot], CAPACITY);
    // web stops at its ceiling
    assert_eq!(s.rates(&[ServiceClass::Web])[&ServiceClass::Web], 60_000_000);
}

#[test]
fn allocations_respect_min_rates_and_capacity() {
    let s = shaper();
    let subsets: [&[ServiceClass]; 4] = [
        &[ServiceClass::Web, ServiceClass::Video],
        &[ServiceClass::Video, ServiceClass::Iot],
        &[ServiceClass::Web, ServiceClass::Iot],
        &ServiceClass::ALL,
    ];
    for active in subsets {
        let rates = s.rates(active);
        assert!(rates.values().sum::<u64>() <= CAPACITY);
        for q in s.queues().iter().filter(|q| active.contains(&q.class)) {
            assert!(rates[&q.class] >= q.min_rate_bps, "{:?} below min", q.class);
        }
    }
}

#[test]
fn unconfigured_class_gets_the_leftover() {
    let mut s = LinkShaper::new(CAPACITY);
    s.install(queue(ServiceClass::Web, 30_000_000, Some(40_000_000), 1));
    let rates = s.rates(&[ServiceClass::Web, ServiceClass::Video]);
    assert_eq!(rates[&ServiceClass::Web], 40_000_000);
    assert_eq!(rates[&ServiceClass::Video], 60_000_000);
}

#[test]
fn reinstall_replaces_and_clear_resets() {
    let mut s = shaper();
    s.install(queue(ServiceClass::Web, 10_000_000, None, 1));
    assert_eq!(s.queues().len(), 3);
    assert_eq!(s.queues()[0].min_rate_bps, 10_000_000);
    s.clear();
    assert!(!s.is_shaping());
}

#[test]
fn default_class_keeps_a_share_when_others_borrow() {
    let mut s = LinkShaper::new(CAPACITY);
    // no ceiling: alone, video would borrow the whole link
    s.install(queue(ServiceClass::Video, 80_000_000, None, 2));
    let rates = s.rates(&[ServiceClass::Video, ServiceClass::Web]);
    assert_eq!(rates[&ServiceClass::Video], 90_000_000);
    assert_eq!(rates[&ServiceClass::Web], 10_000_000);

    let rates = s.rates(&ServiceClass::ALL);
    // spare 20: video group, web, iot get a third each
    assert_eq!(rates[&ServiceClass::Web], rates[&ServiceClass::Iot]);
    assert!(rates[&ServiceClass::Web] >= 6_000_000);
    assert!(rates.values().sum::<u64>() <= CAPACITY);
}
