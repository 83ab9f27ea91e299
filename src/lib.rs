pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod materialize;
pub mod normalize;
pub mod output;
pub mod poll;
pub mod pubchem;
pub mod resolver;
pub mod submit;
pub mod zinc;
