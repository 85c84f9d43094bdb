pub mod metrics_defs;
