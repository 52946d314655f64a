//! Tokio runtime gauges.

use opentelemetry::metrics::Meter;
use tokio::runtime::Handle;

pub(crate) const SCOPE: &str = "forecast_service.runtime";

/// Register scheduler gauges for `runtime` on `meter`.
pub fn register(meter: &Meter, runtime: Handle) {
    let gauges: [(&'static str, &'static str, &'static str, fn(&Handle) -> usize); 3] = [
        (
            "runtime.tokio.workers",
            "Number of worker threads used by the runtime.",
            "{thread}",
            |rt| rt.metrics().num_workers(),
        ),
        (
            "runtime.tokio.alive_tasks",
            "Number of tasks currently alive in the runtime.",
            "{task}",
            |rt| rt.metrics().num_alive_tasks(),
        ),
        (
            "runtime.tokio.global_queue_depth",
            "Number of tasks waiting in the runtime's global queue.",
            "{task}",
            |rt| rt.metrics().global_queue_depth(),
        ),
    ];

    for (name, description, unit, read) in gauges {
        let runtime = runtime.clone();
        meter
            .u64_observable_gauge(name)
            .with_description(description)
            .with_unit(unit)
            .with_callback(move |observer| observer.observe(read(&runtime) as u64, &[]))
            .build();
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::metrics::MeterProvider as _;
    use opentelemetry_sdk::metrics::data::{AggregatedMetrics, MetricData};
    use opentelemetry_sdk::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};

    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reports_worker_count() {
        let exporter = InMemoryMetricExporter::default();
        let provider = SdkMeterProvider::builder()
            .with_reader(PeriodicReader::builder(exporter.clone()).build())
            .build();
        register(&provider.meter(SCOPE), Handle::current());

        let flushed = provider.clone();
        tokio::task::spawn_blocking(move || flushed.force_flush())
            .await
            .unwrap()
            .unwrap();

        let exported = exporter.get_finished_metrics().unwrap();
        let workers = exported
            .iter()
            .flat_map(|rm| rm.scope_metrics())
            .flat_map(|sm| sm.metrics())
            .find(|m| m.name() == "runtime.tokio.workers")
            .map(|m| match m.data() {
                AggregatedMetrics::U64(MetricData::Gauge(gauge)) => {
                    gauge.data_points().map(|p| p.value()).collect::<Vec<_>>()
                }
                _ => Vec::new(),
            });
        assert_eq!(workers, Some(vec![2]));
    }
}
