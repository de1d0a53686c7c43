use std::fmt;

use thiserror::Error;

use crate::reference::Store;
use crate::types::Location;

/// Misuse of the session protocol that the engine detects and refuses.
///
/// These are caller bugs, not properties of the analysed program; see
/// [`QualError`] for the latter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("constraint graph is still open, call `check_nin` first")]
    GraphOpen,
    #[error("linearities have not been computed, call `compute_lins` first")]
    LinearitiesPending,
    #[error("negative constraints have already been checked")]
    AlreadyChecked,
    #[error("linearities have already been computed")]
    AlreadyLinearized,
    #[error("{0} is not an assign store")]
    NotAssignStore(Store),
    #[error("formatting failed")]
    Fmt(#[from] fmt::Error),
}

/// A qualifier error found in the analysed program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualError {
    pub loc: Location,
    pub message: String,
}

impl fmt::Display for QualError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.loc, self.message)
    }
}
