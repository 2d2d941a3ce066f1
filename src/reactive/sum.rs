use super::{SubscriptionId, Value};

/// Addition that stops at the type's ceiling instead of wrapping.
pub trait SaturatingAdd: Copy {
    fn add_saturating(self, rhs: Self) -> Self;
}

macro_rules! impl_saturating_add {
    ($($t:ty),*) => {
        $(impl SaturatingAdd for $t {
            fn add_saturating(self, rhs: Self) -> Self {
                self.saturating_add(rhs)
            }
        })*
    };
}

impl_saturating_add!(u8, u16, u32, u64, usize, i32, i64);

/// Running total of every value a source has dispatched since the last
/// [`reset`](Self::reset).
///
/// The sum shares the source's dispatch mode and is named `Sum(<source>)`.
/// It pins at `T::MAX`, so a cap over it can never wrap back to valid.
pub struct Sum<T> {
    total: Value<T>,
    source: Value<T>,
    subscription: SubscriptionId,
}

impl<T> Clone for Sum<T> {
    fn clone(&self) -> Self {
        Self {
            total: self.total.clone(),
            source: self.source.clone(),
            subscription: self.subscription,
        }
    }
}

impl<T> Sum<T>
where
    T: SaturatingAdd + Default + 'static,
{
    pub fn new(source: &Value<T>) -> Self {
        let name = format!("Sum({})", source.name());
        let total = Value::new(name, T::default(), source.observable().dispatch());

        let acc = total.clone();
        let subscription = source.subscribe(move |v| {
            let next = acc.get().add_saturating(*v);
            acc.set(next);
        });

        Self {
            total,
            source: source.clone(),
            subscription,
        }
    }

    pub fn get(&self) -> T {
        self.total.get()
    }

    /// Zero the total.  Dispatches like any other update.
    pub fn reset(&self) {
        self.total.set(T::default());
    }

    /// Stop accumulating.
    pub fn detach(&self) -> bool {
        self.source.unsubscribe(self.subscription)
    }

    pub fn value(&self) -> &Value<T> {
        &self.total
    }

    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> SubscriptionId {
        self.total.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.total.unsubscribe(id)
    }

    pub fn name(&self) -> &str {
        self.total.name()
    }
}
