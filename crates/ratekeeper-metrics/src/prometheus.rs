//! Prometheus text exposition format.
//!
//! Renders a gauge snapshot for scraping by a Prometheus server or
//! compatible agent. Every series carries a `cluster` label when one is
//! configured.

use std::fmt::Write;

use crate::registry::GaugeSnapshot;

const PREFIX: &str = "ratekeeper_";

/// Render a gauge snapshot into Prometheus text format.
pub fn render_prometheus(snapshot: &GaugeSnapshot) -> String {
    let mut out = String::new();
    let base: Vec<(&str, &str)> = snapshot
        .cluster
        .as_deref()
        .map(|c| vec![("cluster", c)])
        .unwrap_or_default();

    if !snapshot.info.is_empty() {
        let mut labels = base.clone();
        labels.extend(snapshot.info.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        series(
            &mut out,
            "controller_info",
            "Information about the sampling controller configuration",
            "gauge",
            &labels,
            "1",
        );
    }

    if let Some(index) = &snapshot.sample_index {
        let mut labels = base.clone();
        labels.push(("sample_index", index.as_str()));
        series(
            &mut out,
            "sample_index",
            "The current daily index being tracked for index size",
            "gauge",
            &labels,
            "1",
        );
    }

    let gauges: [(&str, &str, f64); 11] = [
        ("proportional", "Proportional term of the last PID update", snapshot.proportional),
        ("integral", "Integral term of the last PID update", snapshot.integral),
        ("derivative", "Derivative term of the last PID update", snapshot.derivative),
        ("unclamped_output", "PID output before clamping", snapshot.unclamped_output),
        ("index_size_mb", "The most recent measurement of the sample index size (in MB)", snapshot.index_size_mb),
        ("bytes_per_window", "The change in index size between windows (in bytes)", snapshot.bytes_per_window),
        ("retrieval_error_count", "Number of consecutive failed attempts to retrieve the sample index size", f64::from(snapshot.retrieval_error_count)),
        ("percent", "Current percent of records to sample", snapshot.percent),
        ("average_rate", "Average rate of index growth (MB/sec)", snapshot.average_rate),
        ("delta_bytes", "The exponential moving average of bytes_per_window", snapshot.delta_bytes),
        ("pid_adjustment", "Adjustment to the percent calculated by the PID controller", snapshot.pid_adjustment),
    ];
    for (name, help, value) in gauges {
        series(&mut out, name, help, "gauge", &base, &format_value(value));
    }

    series(
        &mut out,
        "cycles_total",
        "Corrections applied since start",
        "counter",
        &base,
        &snapshot.cycles_total.to_string(),
    );
    series(
        &mut out,
        "measurement_failures_total",
        "Windows skipped because the index size could not be retrieved",
        "counter",
        &base,
        &snapshot.measurement_failures_total.to_string(),
    );

    out
}

fn series(out: &mut String, name: &str, help: &str, kind: &str, labels: &[(&str, &str)], value: &str) {
    let _ = writeln!(out, "# HELP {PREFIX}{name} {help}");
    let _ = writeln!(out, "# TYPE {PREFIX}{name} {kind}");
    if labels.is_empty() {
        let _ = writeln!(out, "{PREFIX}{name} {value}");
    } else {
        let rendered: Vec<String> = labels
            .iter()
            .map(|(k, v)| format!("{k}=\"{}\"", escape_label(v)))
            .collect();
        let _ = writeln!(out, "{PREFIX}{name}{{{}}} {value}", rendered.join(","));
    }
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        value.to_string()
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
