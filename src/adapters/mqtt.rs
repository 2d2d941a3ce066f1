//! MQTT adapter.
//!
//! Implements [`Transport`] over the ESP-IDF MQTT client.  Inbound
//! messages arrive on the client's task and are converted to
//! [`Event::RemoteCommand`] for the main loop; nothing here touches
//! zone state.
//!
//! The broker drops subscriptions on reconnect, so the client flags every
//! (re)connection and the main loop re-subscribes via
//! [`MqttTransport::resubscribe_if_reconnected`].

use log::warn;

use crate::app::ports::QoS;
use crate::error::Result;
use crate::events::Event;

/// Turn an inbound message into an event.  Non-UTF-8 or oversized
/// messages are dropped with a warning.
pub fn inbound_event(topic: &str, data: &[u8]) -> Option<Event> {
    let Ok(payload) = core::str::from_utf8(data) else {
        warn!("mqtt: non-UTF-8 payload on '{}' dropped", topic);
        return None;
    };
    match Event::remote_command(topic, payload.trim()) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("mqtt: message on '{}' dropped: {}", topic, e);
            None
        }
    }
}

/// QoS of the command subscriptions.
pub fn subscribe_qos() -> QoS {
    QoS::AtLeastOnce
}

#[cfg(target_os = "espidf")]
pub use device::MqttTransport;

#[cfg(target_os = "espidf")]
mod device {
    use core::cell::RefCell;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use esp_idf_svc::mqtt::client::{
        EspMqttClient, EventPayload, MqttClientConfiguration, QoS as EspQoS,
    };
    use log::{error, info, warn};

    use super::{inbound_event, subscribe_qos};
    use crate::app::ports::{QoS, Transport};
    use crate::error::{CommsError, Result};
    use crate::events::push_event;

    fn esp_qos(qos: QoS) -> EspQoS {
        match qos {
            QoS::AtMostOnce => EspQoS::AtMostOnce,
            QoS::AtLeastOnce => EspQoS::AtLeastOnce,
            QoS::ExactlyOnce => EspQoS::ExactlyOnce,
        }
    }

    pub struct MqttTransport {
        client: RefCell<EspMqttClient<'static>>,
        connected: Arc<AtomicBool>,
        reconnected: Arc<AtomicBool>,
    }

    impl MqttTransport {
        pub fn connect(url: &str, client_id: &str) -> Result<Self> {
            let conf = MqttClientConfiguration {
                client_id: Some(client_id),
                ..Default::default()
            };
            let connected = Arc::new(AtomicBool::new(false));
            let reconnected = Arc::new(AtomicBool::new(false));
            let (c, r) = (Arc::clone(&connected), Arc::clone(&reconnected));

            let client = EspMqttClient::new_cb(url, &conf, move |event| match event.payload() {
                EventPayload::Connected(_) => {
                    c.store(true, Ordering::SeqCst);
                    r.store(true, Ordering::SeqCst);
                }
                EventPayload::Disconnected => c.store(false, Ordering::SeqCst),
                EventPayload::Received { topic: Some(topic), data, .. } => {
                    if let Some(event) = inbound_event(topic, data) {
                        push_event(event);
                    }
                }
                EventPayload::Error(e) => warn!("mqtt: {:?}", e),
                _ => {}
            })
            .map_err(|e| {
                error!("mqtt: client init failed: {}", e);
                CommsError::MqttConnectFailed
            })?;

            info!("mqtt: client started ({})", url);
            Ok(Self {
                client: RefCell::new(client),
                connected,
                reconnected,
            })
        }

        pub fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        /// Subscribe to `topics` if the client (re)connected since the
        /// last call.
        pub fn resubscribe_if_reconnected(&self, topics: &[String]) -> Result<()> {
            if !self.reconnected.swap(false, Ordering::SeqCst) {
                return Ok(());
            }
            let mut client = self.client.borrow_mut();
            for topic in topics {
                client
                    .subscribe(topic, esp_qos(subscribe_qos()))
                    .map_err(|_| CommsError::MqttSubscribeFailed)?;
                info!("mqtt: subscribed '{}'", topic);
            }
            Ok(())
        }
    }

    impl Transport for MqttTransport {
        fn publish(
            &self,
            topic: &str,
            payload: &str,
            retain: bool,
            qos: QoS,
        ) -> core::result::Result<(), CommsError> {
            if !self.is_connected() {
                return Err(CommsError::MqttPublishFailed);
            }
            self.client
                .borrow_mut()
                .enqueue(topic, esp_qos(qos), retain, payload.as_bytes())
                .map(|_| ())
                .map_err(|_| CommsError::MqttPublishFailed)
        }
    }
}

/// Broker URL and client id, fixed at build time.
pub fn broker_settings() -> Result<(&'static str, &'static str)> {
    let url = option_env!("IRRIGATOR_MQTT_URL")
        .ok_or(crate::error::Error::Config("IRRIGATOR_MQTT_URL not set at build time"))?;
    Ok((url, option_env!("IRRIGATOR_MQTT_CLIENT_ID").unwrap_or("irrigator")))
}
