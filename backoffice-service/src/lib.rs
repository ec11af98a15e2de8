//! Backoffice Service - travel agency DSR posting, ZATCA invoicing, HR and cash handovers.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
pub mod store;
