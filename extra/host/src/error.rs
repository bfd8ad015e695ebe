/// Errors from configuring and booting the hosted platform.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The configuration asked for zero cores.
    #[error("at least one core is required")]
    NoCores,
    /// Registry or bring-up failure.
    #[error(transparent)]
    Workman(#[from] workman::Error),
}
