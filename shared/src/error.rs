//! Riding errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RideError {
    /// Content error: a species control map lacks a required control code.
    #[error("no control metadata for '{0}'")]
    MissingControl(String),
    #[error("unknown control scheme '{0}'")]
    UnknownControlScheme(String),
    #[error("seat index {index} out of range ({len} seats)")]
    SeatOutOfRange { index: usize, len: usize },
    #[error("seat {0} is already occupied")]
    SeatOccupied(usize),
    #[error("unknown species '{0}'")]
    UnknownSpecies(String),
}
