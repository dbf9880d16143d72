pub mod aggregate;
pub mod calendar;
pub mod config;
pub mod dims;
pub mod fact;
pub mod pipeline;
pub mod source;
pub mod store;
