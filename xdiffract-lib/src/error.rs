use std::fmt;

#[derive(Debug)]
pub enum DiffractError {
    /// Particle model the propagator has no scattering algorithm for.
    UnsupportedParticle(String),
    UnknownElement(String),
    InvalidFormula(String),
    InvalidComposition(String),
    InvalidGeometry(String),
    ShapeMismatch {
        channel: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    /// Failure reported by the external atomistic solver.
    Solver(String),
    Io(std::io::Error),
    DataError(String),
}

pub type Result<T> = std::result::Result<T, DiffractError>;

impl fmt::Display for DiffractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedParticle(p) => write!(f, "unsupported particle model: {p}"),
            Self::UnknownElement(e) => write!(f, "unknown element: {e}"),
            Self::InvalidFormula(formula) => write!(f, "invalid chemical formula: {formula}"),
            Self::InvalidComposition(msg) => write!(f, "invalid material composition: {msg}"),
            Self::InvalidGeometry(msg) => write!(f, "invalid geometry: {msg}"),
            Self::ShapeMismatch {
                channel,
                expected,
                found,
            } => write!(
                f,
                "shape mismatch in channel '{channel}': expected {expected:?}, found {found:?}"
            ),
            Self::Solver(msg) => write!(f, "atomistic solver failed: {msg}"),
            Self::Io(err) => write!(f, "i/o error: {err}"),
            Self::DataError(msg) => write!(f, "data error: {msg}"),
        }
    }
}

impl std::error::Error for DiffractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DiffractError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
