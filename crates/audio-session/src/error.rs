/// Failure reported by an [`AudioPlatform`](crate::AudioPlatform) hardware call.
///
/// These never reach callers of the session manager: the registry logs them and carries on
/// with best-effort routing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("hardware configuration failed during {operation}: {reason}")]
    HardwareConfiguration {
        operation: &'static str,
        reason: String,
    },
    #[error("audio device is busy")]
    DeviceBusy,
    #[error("route not supported: {0}")]
    UnsupportedRoute(String),
}

impl PlatformError {
    pub fn hardware(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::HardwareConfiguration {
            operation,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_error_mentions_operation_and_reason() {
        let err = PlatformError::hardware("set_category", "category rejected");
        assert_eq!(
            err.to_string(),
            "hardware configuration failed during set_category: category rejected"
        );
    }

    #[test]
    fn unsupported_route_carries_route_name() {
        let err = PlatformError::UnsupportedRoute("hdmi".to_string());
        assert_eq!(err.to_string(), "route not supported: hdmi");
    }
}
