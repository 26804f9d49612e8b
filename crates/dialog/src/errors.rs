use thiserror::Error;

/// Failures the engine itself can produce. Stage-level trouble (LLM outages,
/// search failures) is absorbed inside the pipeline and surfaces as a
/// degraded reply instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("session id must not be empty")]
    MissingSession,

    #[error("session store failure: {0}")]
    Store(String),
}

impl EngineError {
    /// Safe Vietnamese text for the end user; detail stays in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingSession => {
                "Xin lỗi, em chưa nhận diện được phiên trò chuyện. Anh/chị vui lòng thử lại ạ."
            }
            Self::Store(_) => {
                "Xin lỗi, hệ thống đang gặp sự cố. Anh/chị vui lòng thử lại sau ít phút ạ."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EngineError;

    #[test]
    fn user_messages_never_leak_internals() {
        let error = EngineError::Store("connection refused at 10.0.0.3:6379".to_string());
        assert!(!error.user_message().contains("10.0.0.3"));
    }
}
