pub mod config;
pub mod db;
pub mod error_convert;
pub mod extract;

pub mod auth;
pub mod repo;
pub mod rest;

pub mod analysis;
pub mod reasoning;
pub mod storage;
pub mod usage;

pub mod health;
pub mod openapi;
pub mod telemetry;
