//! Custom tracing layers

use tracing::{Subscriber, span};
use tracing_subscriber::{
    layer::{Context, Layer},
    registry::LookupSpan,
};

use crate::context::{SessionContextData, SessionContextGuard};

/// Layer that tags spans with the active session
///
/// Every span opened while a [`SessionContextGuard`] is active gets a
/// [`SessionContextExtension`], which later layers can read to attribute
/// work to a session even after the guard is gone.
#[derive(Debug, Default)]
pub struct SessionContextLayer;

impl SessionContextLayer {
    pub fn new() -> Self {
        Self
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct SessionContextExtension {
    pub data: SessionContextData,
}

impl<S> Layer<S> for SessionContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(session) = SessionContextGuard::current() else {
            return;
        };
        if let Some(span) = ctx.span(id) {
            span.extensions_mut()
                .insert(SessionContextExtension { data: session });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anonpoetry_core::Address;
    use tracing_subscriber::{Registry, layer::SubscriberExt};

    use super::*;

    /// Records the session extension of each new span, by span name
    struct Probe(Arc<Mutex<Vec<(String, Option<Address>)>>>);

    impl<S> Layer<S> for Probe
    where
        S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    {
        fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
            let subject = ctx.span(id).and_then(|span| {
                span.extensions()
                    .get::<SessionContextExtension>()
                    .map(|ext| ext.data.subject)
            });
            if let Ok(mut seen) = self.0.lock() {
                seen.push((attrs.metadata().name().to_string(), subject));
            }
        }
    }

    #[test]
    fn test_spans_tagged_while_guard_active() {
        let alice = Address::new([0xa1; 20]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let subscriber = Registry::default()
            .with(SessionContextLayer::new())
            .with(Probe(Arc::clone(&seen)));

        tracing::subscriber::with_default(subscriber, || {
            let _outside = tracing::info_span!("before");
            let _guard = SessionContextGuard::new(&alice);
            let _inside = tracing::info_span!("reveal");
        });

        let seen = seen.lock().unwrap();
        let lookup = |name: &str| seen.iter().find(|(n, _)| n == name).map(|(_, s)| *s);
        assert_eq!(lookup("before"), Some(None));
        assert_eq!(lookup("session"), Some(Some(alice)));
        assert_eq!(lookup("reveal"), Some(Some(alice)));
    }
}
