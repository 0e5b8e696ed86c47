pub mod catalog;
pub mod config;
pub mod corpus;
pub mod error;
pub mod matchup;
pub mod report;
pub mod roles;
pub mod rules;
pub mod score;
pub mod sweep;
pub mod views;
