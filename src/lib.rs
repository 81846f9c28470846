pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod repository;
pub mod request;
pub mod schedule;
pub mod web;
