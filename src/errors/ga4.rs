use anyhow::anyhow;

// upstream failures, split by how the gateway has to answer:
// a rejected credential is not the same conversation as a failed query
#[derive(thiserror::Error, Debug)]
pub enum Ga4Error {
    #[error("Invalid credentials")]
    Unauthorized(#[source] anyhow::Error),
    #[error("{0}")]
    Report(String),
    #[error(transparent)]
    Network(#[from] reqwest::Error),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl Ga4Error {
    #[must_use]
    pub fn unauthorized(detail: impl std::fmt::Display) -> Self {
        Self::Unauthorized(anyhow!("{detail}"))
    }
}
