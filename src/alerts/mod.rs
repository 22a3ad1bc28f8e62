pub mod dispatcher;
pub mod evaluator;
