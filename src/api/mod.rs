//! Collaborators talking to the device-testing service: asset upload,
//! matrix submission, status polling and result download.

pub mod assets;
pub mod client;
pub mod download;
pub mod matrix;
pub mod model;
pub mod poll;

pub use assets::{upload_test_assets, UploadedAssets};
pub use client::TestingApiClient;
pub use download::{create_download_dir, download_test_assets};
pub use matrix::{build_matrix, start_test_run};
pub use poll::wait_for_completion;
