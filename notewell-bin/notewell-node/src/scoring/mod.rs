pub mod bayesian;
pub mod mf_adapter;
pub mod mf_core;
pub mod scorer;
pub mod scorer_factory;
pub mod tabular;
pub mod tier;
