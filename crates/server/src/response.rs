use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Envelope for every non-streamed JSON body
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error_type: Option<String>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn error(error_type: &str, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error_type: Some(error_type.to_string()),
            message: Some(message.to_string()),
        }
    }
}
