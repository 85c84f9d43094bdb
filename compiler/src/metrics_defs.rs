use shared::metrics_defs::{MetricDef, MetricType};

pub const COMPILE_DURATION: MetricDef = MetricDef {
    name: "compiler.duration",
    metric_type: MetricType::Histogram,
    description: "Time spent compiling the routing table, in seconds.",
};

pub const INTENTS_COLLECTED: MetricDef = MetricDef {
    name: "compiler.intents.collected",
    metric_type: MetricType::Gauge,
    description: "Route intents produced by the collector before deduplication",
};

pub const ROUTES_EMITTED: MetricDef = MetricDef {
    name: "compiler.routes.emitted",
    metric_type: MetricType::Gauge,
    description: "Routes in the compiled table, excluding the catch-all",
};

pub const CLUSTERS_EMITTED: MetricDef = MetricDef {
    name: "compiler.clusters.emitted",
    metric_type: MetricType::Gauge,
    description: "Distinct upstream clusters in the compiled table",
};

pub const RECORDS_SKIPPED: MetricDef = MetricDef {
    name: "compiler.records.skipped",
    metric_type: MetricType::Counter,
    description: "Input records skipped or dropped. Tagged with reason.",
};

pub const REGISTRY_MISSES: MetricDef = MetricDef {
    name: "compiler.registry.misses",
    metric_type: MetricType::Counter,
    description: "Deployments with no registry entry, compiled with the standard template",
};

pub const ALL_METRICS: &[MetricDef] = &[
    COMPILE_DURATION,
    INTENTS_COLLECTED,
    ROUTES_EMITTED,
    CLUSTERS_EMITTED,
    RECORDS_SKIPPED,
    REGISTRY_MISSES,
];
