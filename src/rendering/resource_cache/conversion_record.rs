use crate::rendering::render_backend::RenderEntity;
use crate::simulation::types::SubscriptionToken;
use arc_swap::ArcSwapOption;
use std::collections::HashSet;
use std::sync::Arc;

/// The slot a conversion writes its result into. Conversion tasks keep their own reference to it, so replacing the
/// slot on invalidation makes any result that is still in flight land in a slot nobody reads anymore.
pub type ConversionSlot<I> = Arc<ArcSwapOption<I>>;

/// One cached conversion of a simulation resource `K` into the IR `I` and the backend resource `H`.
pub struct ConversionRecord<K, I, H> {
    pub key: K,
    slot: ConversionSlot<I>,
    handle: Option<H>,
    subscriptions: Vec<SubscriptionToken>,
    /// Entities that currently display this resource.
    pub dependents: HashSet<RenderEntity>,
    in_flight: bool,
}

impl<K, I, H: Copy> ConversionRecord<K, I, H> {
    pub fn new(key: K, subscriptions: Vec<SubscriptionToken>) -> Self {
        Self {
            key,
            slot: Arc::new(ArcSwapOption::empty()),
            handle: None,
            subscriptions,
            dependents: HashSet::new(),
            in_flight: false,
        }
    }

    #[inline]
    pub fn handle(&self) -> Option<H> {
        self.handle
    }

    pub fn set_handle(&mut self, handle: H) {
        self.handle = Some(handle);
    }

    #[inline]
    pub fn converted(&self) -> Option<Arc<I>> {
        self.slot.load_full()
    }

    pub fn store(&self, converted: I) -> Arc<I> {
        let converted = Arc::new(converted);
        self.slot.store(Some(converted.clone()));
        converted
    }

    pub fn slot(&self) -> ConversionSlot<I> {
        self.slot.clone()
    }

    pub fn is_current_slot(&self, slot: &ConversionSlot<I>) -> bool {
        Arc::ptr_eq(&self.slot, slot)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn set_in_flight(&mut self, in_flight: bool) {
        self.in_flight = in_flight;
    }

    /// Drops the converted value (the record itself and its subscriptions stay). Returns the backend resource that
    /// is not needed anymore once all dependents have been rebuilt.
    pub fn invalidate(&mut self) -> Option<H> {
        self.slot = Arc::new(ArcSwapOption::empty());
        self.in_flight = false;
        self.handle.take()
    }

    pub fn take_subscriptions(&mut self) -> Vec<SubscriptionToken> {
        std::mem::take(&mut self.subscriptions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidation_orphans_in_flight_slot() {
        let mut record: ConversionRecord<u32, String, u64> = ConversionRecord::new(1, vec![]);
        let slot = record.slot();
        record.set_in_flight(true);
        record.set_handle(5);

        assert_eq!(record.invalidate(), Some(5));
        assert!(!record.is_current_slot(&slot));
        assert!(!record.is_in_flight());

        // the old task finishing doesn't make the record converted
        slot.store(Some(Arc::new("stale".to_string())));
        assert!(record.converted().is_none());

        record.store("fresh".to_string());
        assert_eq!(record.converted().as_deref().map(String::as_str), Some("fresh"));
    }
}
