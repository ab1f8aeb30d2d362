//! Callbacks module for handling all inline keyboard callback queries
//!
//! - `callback_handler`: Main routing handler for all callback queries
//! - `callback_types`: Parsing of callback data into actions
//! - `owner_callbacks`: Owner approval and rejection of payments

pub mod callback_handler;
pub mod callback_types;
pub mod owner_callbacks;
