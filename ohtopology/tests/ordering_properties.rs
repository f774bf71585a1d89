//! Property tests: notification order and source-list replacement

mod common;

use std::sync::Arc;

use common::*;
use ohtopology::{Engine, Notification, ProductEvent, TopologyConfig, WeakGroup};
use proptest::prelude::*;

const DEVICES: usize = 3;

#[derive(Debug, Clone)]
enum Op {
    Standby(bool),
    Room(u8),
    SourceIndex(u32),
    SourceList(usize),
}

fn step() -> impl Strategy<Value = (usize, Op)> {
    (
        0..DEVICES,
        prop_oneof![
            any::<bool>().prop_map(Op::Standby),
            any::<u8>().prop_map(Op::Room),
            (0u32..6).prop_map(Op::SourceIndex),
            (0usize..5).prop_map(Op::SourceList),
        ],
    )
}

/// What the listener should end up believing about one device.
struct Expected {
    sources: Vec<String>,
    source_index: usize,
    room: String,
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn dispatch_order_matches_event_order(script in prop::collection::vec(step(), 1..40)) {
        let list = MockDeviceList::new();
        let factory = MockProxyFactory::new();
        let (listener, events) = recorder();
        let engine = Engine::with_config(
            TopologyConfig::default().with_moderated_refresh(false).with_max_job_count(4),
            list.clone(),
            factory.clone(),
            listener,
        )
        .unwrap();

        let mut proxies = Vec::new();
        let mut groups: Vec<WeakGroup> = Vec::new();
        let mut models = Vec::new();
        for i in 0..DEVICES {
            let udn = format!("uuid:{}", i);
            let proxy = MockProductProxy::new("Start", &[("A", "Analog", true), ("B", "Analog", true)]);
            factory.register(&udn, Arc::clone(&proxy));
            list.appear(&product_device(&udn));
            proxy.emit(ProductEvent::Initial);
            let added = events.next();
            prop_assert_eq!(added.notification, Notification::Added);
            groups.push(added.group);
            proxies.push(proxy);
            models.push(Expected {
                sources: vec!["A".to_string(), "B".to_string()],
                source_index: 0,
                room: "Start".to_string(),
            });
        }

        let mut expected = Vec::new();
        for (n, (device, op)) in script.iter().enumerate() {
            let proxy = &proxies[*device];
            let model = &mut models[*device];
            let udn = format!("uuid:{}", device);
            match op {
                Op::Standby(value) => {
                    proxy.update(|s| s.standby = *value);
                    proxy.emit(ProductEvent::StandbyChanged);
                    expected.push((udn, Notification::StandbyChanged));
                }
                Op::Room(value) => {
                    model.room = format!("Room{}", value);
                    let room = model.room.clone();
                    proxy.update(|s| s.room = room);
                    proxy.emit(ProductEvent::RoomChanged);
                }
                Op::SourceIndex(index) => {
                    let index = *index as usize;
                    proxy.update(|s| s.source_index = index as u32);
                    proxy.emit(ProductEvent::SourceIndexChanged);
                    let count = model.sources.len();
                    if index < count || (count == 0 && index == 0) {
                        model.source_index = index;
                        expected.push((udn, Notification::SourceIndexChanged));
                    }
                }
                Op::SourceList(len) => {
                    let names: Vec<String> = (0..*len).map(|j| format!("L{}x{}", n, j)).collect();
                    let entries: Vec<(&str, &str, bool)> =
                        names.iter().map(|name| (name.as_str(), "Analog", true)).collect();
                    let xml = source_xml(&entries);
                    proxy.update(|s| s.source_xml = xml);
                    proxy.emit(ProductEvent::SourceListChanged);
                    model.source_index = model.source_index.min(len.saturating_sub(1));
                    model.sources = names;
                    expected.push((udn, Notification::SourceListChanged));
                }
            }
        }

        let dispatched: Vec<(String, Notification)> = (0..expected.len())
            .map(|_| {
                let r = events.next();
                (r.snapshot.udn, r.notification)
            })
            .collect();
        prop_assert_eq!(dispatched, expected);

        for (group, model) in groups.iter().zip(models.iter()) {
            let group = group.upgrade().unwrap();
            let names: Vec<String> = group.sources().iter().map(|s| s.name().to_string()).collect();
            prop_assert_eq!(&names, &model.sources);
            prop_assert_eq!(group.source_index(), model.source_index);
            prop_assert_eq!(group.room(), model.room.clone());
        }

        engine.shutdown().unwrap();
    }
}
