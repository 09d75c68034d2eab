use thiserror::Error;

#[derive(Error, Debug)]
pub enum AstGrepError {
    #[error("invalid pattern: {message}")]
    InvalidPattern { message: String },

    #[error("metavariable '{name}' not found in match")]
    MetavarNotFound { name: String },
}
