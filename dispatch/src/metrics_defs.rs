//! Metric definitions emitted by the dispatcher.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
}

impl MetricType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "Counter",
            MetricType::Histogram => "Histogram",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

#[macro_export]
macro_rules! counter {
    ($def:expr) => {
        metrics::counter!($def.name)
    };
    ($def:expr, $($label:literal => $value:expr),+ $(,)?) => {
        metrics::counter!($def.name, $($label => $value),+)
    };
}

#[macro_export]
macro_rules! histogram {
    ($def:expr) => {
        metrics::histogram!($def.name)
    };
    ($def:expr, $($label:literal => $value:expr),+ $(,)?) => {
        metrics::histogram!($def.name, $($label => $value),+)
    };
}

/// Register every metric's description with the installed recorder.
pub fn describe_metrics() {
    for def in ALL_METRICS {
        tracing::debug!(metric = def.name, kind = def.metric_type.as_str(), "Describing metric");
        match def.metric_type {
            MetricType::Counter => metrics::describe_counter!(def.name, def.description),
            MetricType::Histogram => metrics::describe_histogram!(def.name, def.description),
        }
    }
}

pub const PUSH_DISPATCHED: MetricDef = MetricDef {
    name: "push.dispatched",
    metric_type: MetricType::Counter,
    description: "Pushes handed to a transport. Tagged with strategy.",
};

pub const PUSH_FAILED: MetricDef = MetricDef {
    name: "push.failed",
    metric_type: MetricType::Counter,
    description: "Dispatches that raised an error. Tagged with strategy, kind.",
};

pub const PUSH_DURATION: MetricDef = MetricDef {
    name: "push.duration",
    metric_type: MetricType::Histogram,
    description: "Dispatch duration in seconds. Tagged with strategy.",
};

pub const V2_GROUP_REQUESTS: MetricDef = MetricDef {
    name: "push.v2.group_requests",
    metric_type: MetricType::Counter,
    description: "Per-server requests issued by v2 dispatches",
};

pub const ALL_METRICS: &[MetricDef] = &[
    PUSH_DISPATCHED,
    PUSH_FAILED,
    PUSH_DURATION,
    V2_GROUP_REQUESTS,
];
