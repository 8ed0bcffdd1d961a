//! Lifecycle contract consumed by the host analytics dispatcher.

use crate::error::MetrikaResult;
use crate::payload::EventPayload;

/// The hooks a host dispatcher drives, in the order it drives them:
/// `initialize` once at startup, `loaded` polled until true, then `track`,
/// `page` and `identify` per user action. Only `initialize` can fail; the
/// dispatch hooks must never break the host application and therefore
/// return nothing.
pub trait AnalyticsPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn initialize(&self) -> MetrikaResult<()>;

    fn loaded(&self) -> bool;

    fn track(&self, payload: &EventPayload);

    fn page(&self, payload: &EventPayload);

    fn identify(&self, payload: &EventPayload);
}
