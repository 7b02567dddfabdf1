#![warn(missing_docs)]

//! Storgate proxy subsystem: S3 event-notification routing and automatic
//! NFS export provisioning in front of an S3-compatible gateway

pub mod auth;
pub mod classify;
pub mod config;
pub mod config_store;
pub mod error;
pub mod event;
pub mod export;
pub mod http;
pub mod notify;
pub mod proxy;
pub mod publish;
pub mod rules;
pub mod store;
