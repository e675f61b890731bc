use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template {path} is not valid UTF-8")]
    NotUtf8 { path: String },

    #[error("invalid element pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type TemplateResult<T> = Result<T, TemplateError>;
