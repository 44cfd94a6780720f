//! git-svn bridge operations.

pub mod client;

pub use client::GitSvnClient;
