//! Terminal dashboard for the KafkaSync download pipeline.
//!
//! [`poller::Poller`] keeps a [`models::ViewState`] current by polling the API
//! server through a [`download_client::DownloadSource`], [`view::render`]
//! turns that state into a [`view::DashboardView`], and [`ui`] draws it.

pub mod config;
pub mod download_client;
pub mod error;
pub mod logging;
pub mod models;
pub mod poller;
pub mod ui;
pub mod view;
