use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUESTS: MetricDef = MetricDef {
    name: "requests",
    metric_type: MetricType::Counter,
    description: "Number of release notes requests. Tagged with outcome.",
};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with status.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const ISSUES_FETCHED: MetricDef = MetricDef {
    name: "issues.fetched",
    metric_type: MetricType::Histogram,
    description: "Number of distinct issues fetched for one pipeline run",
};

pub const PUBLISH_FAILURES: MetricDef = MetricDef {
    name: "publish.failures",
    metric_type: MetricType::Counter,
    description: "Number of release notes that were built but could not be published",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUESTS,
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    ISSUES_FETCHED,
    PUBLISH_FAILURES,
];
