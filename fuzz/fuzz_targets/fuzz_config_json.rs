//! Fuzz target: `SystemConfig::from_json`
//!
//! Feeds arbitrary bytes to the configuration loader and checks that
//! whatever it accepts is internally consistent:
//! - No panics under any byte sequence
//! - Accepted configurations pass `validate()` again
//! - Every accepted zone's topics fit the topic buffers
//! - Accepted configurations survive a serialize → parse round trip
//!
//! cargo fuzz run fuzz_config_json

#![no_main]

use irrigator::config::{LONGEST_TOPIC_SUFFIX, SystemConfig, TOPIC_BUDGET};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = core::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = SystemConfig::from_json(json) else {
        return;
    };

    assert!(config.validate().is_ok());
    for zone in &config.zones {
        assert!(zone.humidity.min_humidity < zone.humidity.max_humidity);
        assert!(zone.pump.pump_cap_ms >= zone.pump.pump_duration_ms);
        assert!(config.topic_base(zone).len() + LONGEST_TOPIC_SUFFIX.len() <= TOPIC_BUDGET);
    }
    assert!(config.timer_slots >= config.required_timer_slots());

    let text = serde_json::to_string(&config).expect("accepted config must serialize");
    let again = SystemConfig::from_json(&text).expect("serialized config must parse");
    assert_eq!(again.zones.len(), config.zones.len());
});
