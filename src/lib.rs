pub mod artifact;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod logistic_regression;
pub mod parse;
pub mod pipeline;
pub mod predictor;
pub mod scaler;
pub mod server;
pub mod split;
pub mod support_vector_machine;
