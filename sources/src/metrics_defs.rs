use shared::metrics_defs::{MetricDef, MetricType};

pub const SOURCE_LOAD_DURATION: MetricDef = MetricDef {
    name: "sources.load.duration",
    metric_type: MetricType::Histogram,
    description: "Time to load one routing source, in seconds. Tagged with source.",
};

pub const RECORDS_UNDECODABLE: MetricDef = MetricDef {
    name: "sources.records.undecodable",
    metric_type: MetricType::Counter,
    description: "Source records that could not be decoded and were skipped. Tagged with source.",
};

pub const SINK_PUBLISH_DURATION: MetricDef = MetricDef {
    name: "sink.publish.duration",
    metric_type: MetricType::Histogram,
    description: "Time to publish a configuration to the control plane, in seconds.",
};

pub const SINK_PUBLISH_FAILURES: MetricDef = MetricDef {
    name: "sink.publish.failures",
    metric_type: MetricType::Counter,
    description: "Publish attempts rejected by or not delivered to the control plane",
};

pub const ALL_METRICS: &[MetricDef] = &[
    SOURCE_LOAD_DURATION,
    RECORDS_UNDECODABLE,
    SINK_PUBLISH_DURATION,
    SINK_PUBLISH_FAILURES,
];
