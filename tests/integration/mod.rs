mod breaker;
mod config;
mod pipeline;
mod properties;
mod support;
