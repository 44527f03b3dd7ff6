//! Store change -> watch event classification.
//!
//! A subscriber sees a change in terms of its own filter. A record that
//! starts matching is `Created` for it, one that stops matching is
//! `Deleted`, one that matches on both sides is `Updated`, and changes
//! outside the filter on both sides are invisible.

use inventory_db::StoreEvent;
use inventory_types::{Filter, WatchEventType};

use crate::watch::WatchEvent;

/// Translate a store change into the event a subscriber with `filter`
/// should see, if any.
pub fn classify(filter: &Filter, event: &StoreEvent) -> Option<WatchEvent> {
    let was = event.previous.as_ref().is_some_and(|r| filter.matches(r));
    let now = event.current.as_ref().is_some_and(|r| filter.matches(r));

    let (event_type, resource) = match (was, now) {
        (false, true) => (WatchEventType::Created, event.current.as_ref()?),
        (true, true) => (WatchEventType::Updated, event.current.as_ref()?),
        (true, false) => (WatchEventType::Deleted, event.previous.as_ref()?),
        (false, false) => return None,
    };

    Some(WatchEvent {
        sequence: event.revision,
        event_type,
        resource: resource.clone(),
    })
}
