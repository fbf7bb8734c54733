//! Shared test infrastructure

pub mod mock_gateway;
pub mod mock_repos;
