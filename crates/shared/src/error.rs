use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown component status `{value}`")]
pub struct ParseStatusError {
    pub value: String,
}

impl ParseStatusError {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}
