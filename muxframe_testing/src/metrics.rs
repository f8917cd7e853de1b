//! Metric capture using `metrics-util`'s debugging recorder.
//!
//! Connection loops run as spawned tasks, so captures drive the test body on
//! a current-thread runtime: every task then records on the thread where the
//! local recorder is installed.

use std::future::Future;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

/// Metric values captured while running a test body.
pub struct MetricsCapture {
    entries: Vec<(String, Vec<(String, String)>, DebugValue)>,
}

/// Run `body` to completion on a fresh current-thread runtime with a local
/// debugging recorder installed, returning what was recorded.
///
/// # Panics
///
/// Panics if the runtime cannot be built.
pub fn capture<F, Fut>(body: F) -> MetricsCapture
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    metrics::with_local_recorder(&recorder, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("build current-thread runtime")
            .block_on(body());
    });
    MetricsCapture::from_snapshotter(&snapshotter)
}

impl MetricsCapture {
    fn from_snapshotter(snapshotter: &Snapshotter) -> Self {
        let entries = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .map(|(key, _, _, value)| {
                let labels = key
                    .key()
                    .labels()
                    .map(|label| (label.key().to_owned(), label.value().to_owned()))
                    .collect();
                (key.key().name().to_owned(), labels, value)
            })
            .collect();
        Self { entries }
    }

    /// Sum of the counter `name` across series matching every `labels` pair.
    #[must_use]
    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.matching(name, labels)
            .filter_map(|value| match value {
                DebugValue::Counter(count) => Some(*count),
                _ => None,
            })
            .sum()
    }

    /// Value of the gauge `name`, if recorded.
    #[must_use]
    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.matching(name, &[]).find_map(|value| match value {
            DebugValue::Gauge(gauge) => Some(gauge.into_inner()),
            _ => None,
        })
    }

    fn matching<'a>(
        &'a self,
        name: &'a str,
        labels: &'a [(&'a str, &'a str)],
    ) -> impl Iterator<Item = &'a DebugValue> + 'a {
        self.entries
            .iter()
            .filter(move |(entry_name, entry_labels, _)| {
                entry_name == name
                    && labels.iter().all(|(k, v)| {
                        entry_labels
                            .iter()
                            .any(|(ek, ev)| ek == k && ev == v)
                    })
            })
            .map(|(_, _, value)| value)
    }
}
