use serde::{Deserialize, Serialize};

use scout_common::types::Agent;

#[derive(Serialize, Deserialize)]
pub struct InfoResponse {
    pub agent: Option<Agent>,
    pub registered: bool,
    pub process_count: usize,
    pub monitored_count: usize,
    pub version: String,
}
