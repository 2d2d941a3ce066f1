//! Outbound telemetry.
//!
//! A [`Publisher`] mirrors one observable onto the topic
//! `"{base}/{observable name}"`.  Every dispatch produces an `info!` trace
//! line and, when a transport is attached, a publish.  Without a
//! transport (boot, Wi-Fi down) publishing degrades to the trace line and
//! zone logic keeps running.

use core::cell::RefCell;
use core::fmt::{Display, Write as _};
use std::rc::Rc;

use log::{info, warn};

use crate::app::ports::{QoS, Transport};
use crate::error::{CommsError, Result};
use crate::reactive::{Observable, SubscriptionId};

pub const TOPIC_CAP: usize = 64;

/// Shared, swappable handle to the transport.
#[derive(Clone, Default)]
pub struct Telemetry {
    transport: Rc<RefCell<Option<Rc<dyn Transport>>>>,
}

impl Telemetry {
    /// No transport attached; publishes only trace.
    pub fn offline() -> Self {
        Self::default()
    }

    pub fn attach(&self, transport: Rc<dyn Transport>) {
        *self.transport.borrow_mut() = Some(transport);
        info!("telemetry: transport attached");
    }

    pub fn detach(&self) {
        if self.transport.borrow_mut().take().is_some() {
            warn!("telemetry: transport detached, publishing offline");
        }
    }

    pub fn is_online(&self) -> bool {
        self.transport.borrow().is_some()
    }

    pub fn publish(&self, topic: &str, payload: &str, retain: bool, qos: QoS) {
        info!("{} {}", topic, payload);
        let transport = self.transport.borrow().clone();
        if let Some(transport) = transport {
            if let Err(e) = transport.publish(topic, payload, retain, qos) {
                warn!("telemetry: {} dropped: {}", topic, e);
            }
        }
    }
}

struct Inner<T> {
    topic: heapless::String<TOPIC_CAP>,
    telemetry: Telemetry,
    retain: bool,
    qos: QoS,
    source: RefCell<Option<(Observable<T>, SubscriptionId)>>,
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        if let Some((observable, id)) = self.source.get_mut().take() {
            observable.unsubscribe(id);
        }
    }
}

/// Publishes an observable's payloads under a fixed topic.
///
/// The source can be swapped at runtime with [`attach`](Self::attach);
/// the topic stays the same.
pub struct Publisher<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Display + Clone + 'static> Publisher<T> {
    pub fn new(base: &str, name: &str, telemetry: &Telemetry) -> Result<Self> {
        let mut topic = heapless::String::new();
        write!(topic, "{base}/{name}").map_err(|_| CommsError::MessageTooLong)?;
        Ok(Self {
            inner: Rc::new(Inner {
                topic,
                telemetry: telemetry.clone(),
                retain: false,
                qos: QoS::AtMostOnce,
                source: RefCell::new(None),
            }),
        })
    }

    /// Publisher for `observable`, attached immediately.
    pub fn for_observable(base: &str, observable: &Observable<T>, telemetry: &Telemetry) -> Result<Self> {
        let publisher = Self::new(base, observable.name(), telemetry)?;
        publisher.attach(observable);
        Ok(publisher)
    }

    #[must_use]
    pub fn with_options(self, retain: bool, qos: QoS) -> Self {
        match Rc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.retain = retain;
                inner.qos = qos;
                Self { inner: Rc::new(inner) }
            }
            // Already shared; options are fixed once subscribed.
            Err(inner) => Self { inner },
        }
    }

    /// Publish every dispatch of `observable`, replacing the previous
    /// source.
    pub fn attach(&self, observable: &Observable<T>) {
        self.detach();
        let weak = Rc::downgrade(&self.inner);
        let id = observable.subscribe(move |value| {
            if let Some(inner) = weak.upgrade() {
                inner
                    .telemetry
                    .publish(&inner.topic, &value.to_string(), inner.retain, inner.qos);
            }
        });
        *self.inner.source.borrow_mut() = Some((observable.clone(), id));
    }

    /// Stop publishing.  Returns `false` if nothing was attached.
    pub fn detach(&self) -> bool {
        let previous = self.inner.source.borrow_mut().take();
        match previous {
            Some((observable, id)) => observable.unsubscribe(id),
            None => false,
        }
    }

    pub fn is_attached_to(&self, observable: &Observable<T>) -> bool {
        self.inner
            .source
            .borrow()
            .as_ref()
            .is_some_and(|(o, _)| o.id() == observable.id())
    }

    pub fn topic(&self) -> &str {
        &self.inner.topic
    }
}
