//! Fuzz target: inbound MQTT message → pump command
//!
//! Splits the input into a topic and a payload, runs it through the same
//! path the MQTT client uses (`inbound_event` → `CommandRouter::dispatch`
//! → `parse_duration`) and checks:
//! - No panics under any byte sequence
//! - A routed command reaches the pump only with a payload that parses
//!   as a decimal `u32`
//! - Unrouted topics are always rejected
//!
//! cargo fuzz run fuzz_remote_command

#![no_main]

use std::cell::Cell;
use std::rc::Rc;

use irrigator::adapters::mqtt::inbound_event;
use irrigator::app::commands::{CommandRouter, parse_duration};
use irrigator::events::Event;
use libfuzzer_sys::fuzz_target;

const PUMP_TOPIC: &str = "Plant 1/Pump";

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // First byte picks the split point; topic bytes may be any garbage,
    // or the routed topic when the selector's top bit is set.
    let (selector, rest) = data.split_at(1);
    let routed = selector[0] & 0x80 != 0;
    let split = usize::from(selector[0] & 0x7f).min(rest.len());
    let (topic_bytes, payload) = rest.split_at(split);
    let topic = if routed {
        PUMP_TOPIC.to_string()
    } else {
        String::from_utf8_lossy(topic_bytes).into_owned()
    };

    let router = CommandRouter::new();
    let observable = router.register(PUMP_TOPIC).unwrap();
    let started = Rc::new(Cell::new(None));
    let s = Rc::clone(&started);
    observable.subscribe(move |p: &String| s.set(parse_duration(p).ok()));

    let Some(Event::RemoteCommand { topic, payload }) = inbound_event(&topic, payload) else {
        return;
    };

    let result = router.dispatch(&topic, &payload);
    if topic.as_str() == PUMP_TOPIC {
        assert!(result.is_ok());
        assert_eq!(started.get(), payload.trim().parse::<u32>().ok());
    } else {
        assert!(result.is_err(), "unrouted topic must be rejected");
        assert_eq!(started.get(), None);
    }
});
