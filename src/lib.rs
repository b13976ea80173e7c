//! ConferenceTracker: a conference presentations and speakers site.
//!
//! [`startup::Startup`] registers the application's services and assembles the
//! ordered request pipeline; [`server::run_server`] hosts it.

pub mod admin;
pub mod auth;
pub mod config;
pub mod controllers;
pub mod cookie_policy;
pub mod cors;
pub mod db;
pub mod error;
pub mod identity;
pub mod models;
pub mod pages;
pub mod pipeline;
pub mod repositories;
pub mod request_id;
pub mod routing;
pub mod server;
pub mod services;
pub mod startup;
pub mod state;
pub mod views;
