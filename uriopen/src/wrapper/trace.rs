use std::sync::Arc;

use crate::{Opener, OpenerRegistry, ValueStream};

/// Wrapper for an opener that logs operations with the `tracing` crate.
///
/// * The start of each open and successful opens are logged at the `TRACE` level
/// * All errors will be logged at the `ERROR` level
///
/// Results are returned unchanged, errors are not annotated.
#[derive(Debug)]
pub struct TracedOpener<O> {
    name: String,
    inner: O,
}

impl<O> TracedOpener<O> {
    /// Creates a new `TracedOpener` with the given name and inner opener.
    ///
    /// All logs will contain the name of the opener.
    pub fn new(name: impl Into<String>, inner: O) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_inner(self) -> O {
        self.inner
    }
}

#[async_trait::async_trait]
impl<O> Opener for TracedOpener<O>
where
    O: Opener,
{
    async fn open(&self, uri: &str) -> Result<ValueStream, anyhow::Error> {
        tracing::trace!(opener = %self.name, uri, "open::start");
        match self.inner.open(uri).await {
            Ok(stream) => {
                tracing::trace!(opener = %self.name, uri, "open::ok");
                Ok(stream)
            }
            Err(e) => {
                tracing::error!(opener = %self.name, uri, error = %e, "open::failed");
                Err(e)
            }
        }
    }
}

impl OpenerRegistry {
    /// Wrap every registered opener in a [`TracedOpener`] named after its scheme.
    pub fn into_traced(self) -> Self {
        let schemes: Vec<String> = self.schemes().into_iter().map(str::to_owned).collect();
        let mut traced = OpenerRegistry::new();
        for scheme in schemes {
            if let Some(opener) = self.get(&scheme) {
                let wrapped = TracedOpener::new(scheme.clone(), Arc::clone(opener));
                traced.insert(scheme, wrapped);
            }
        }
        traced
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt as _;

    use super::*;
    use crate::{open_fn, read_to_bytes, stream_from_bytes};

    /// Records level and message of every event.
    #[derive(Clone, Default)]
    struct EventLog(Arc<Mutex<Vec<(Level, String)>>>);

    impl EventLog {
        fn events(&self) -> Vec<(Level, String)> {
            self.0.lock().unwrap().clone()
        }
    }

    struct MessageVisitor(String);

    impl tracing::field::Visit for MessageVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{value:?}");
            }
        }
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventLog {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut visitor = MessageVisitor(String::new());
            event.record(&mut visitor);
            self.0
                .lock()
                .unwrap()
                .push((*event.metadata().level(), visitor.0));
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("backend unavailable")]
    struct Unavailable;

    #[test_log::test(tokio::test)]
    async fn test_traced_opener_passes_results_through() {
        let ok = TracedOpener::new(
            "ok",
            open_fn(|uri: String| async move { Ok(stream_from_bytes(uri)) }),
        );
        let data = read_to_bytes(ok.open("x://data").await.unwrap())
            .await
            .unwrap();
        assert_eq!(data.as_ref(), b"x://data");

        let failing = TracedOpener::new(
            "failing",
            open_fn(|_uri: String| async move { Err(anyhow::Error::new(Unavailable)) }),
        );
        let err = failing.open("x://data").await.err().unwrap();
        assert!(err.is::<Unavailable>());
        assert_eq!(err.chain().count(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_into_traced_keeps_bindings() {
        let registry = OpenerRegistry::new()
            .register(
                "a",
                open_fn(|_uri: String| async move { Ok(stream_from_bytes("a")) }),
            )
            .register(
                "b",
                open_fn(|_uri: String| async move { Ok(stream_from_bytes("b")) }),
            )
            .into_traced();

        assert_eq!(registry.schemes(), vec!["a", "b"]);
        let data = read_to_bytes(registry.resolve("b://1").await.unwrap())
            .await
            .unwrap();
        assert_eq!(data.as_ref(), b"b");
    }

    #[tokio::test]
    async fn test_log_levels() {
        let log = EventLog::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(log.clone()));

        let ok = TracedOpener::new(
            "ok",
            open_fn(|uri: String| async move { Ok(stream_from_bytes(uri)) }),
        );
        ok.open("x://data").await.unwrap();

        let failing = TracedOpener::new(
            "failing",
            open_fn(|_uri: String| async move { Err(anyhow::Error::new(Unavailable)) }),
        );
        failing.open("x://data").await.err().unwrap();

        let events = log.events();
        let events: Vec<(Level, &str)> = events
            .iter()
            .map(|(level, message)| (*level, message.as_str()))
            .collect();
        assert_eq!(
            events,
            vec![
                (Level::TRACE, "open::start"),
                (Level::TRACE, "open::ok"),
                (Level::TRACE, "open::start"),
                (Level::ERROR, "open::failed"),
            ]
        );
    }
}
