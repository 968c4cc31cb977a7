pub mod authors;
pub mod config;
pub mod evaluate;
pub mod pipeline;
pub mod progress;
pub mod quality;
pub mod report;
pub mod tables;
pub mod terminology;
pub mod textutil;
