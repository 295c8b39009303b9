//! Application-wide error types.

use thiserror::Error;

use crate::bus::BusError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn config_error_display() {
        let e = AppError::Config("MESH_BUS_HOST env required".into());
        assert!(e.to_string().contains("MESH_BUS_HOST"));
    }

    #[test]
    fn logger_error_display() {
        let e = AppError::Logger("already initialized".into());
        assert!(e.to_string().contains("already initialized"));
    }

    #[test]
    fn bus_auth_error_converts() {
        let e: AppError = BusError::Auth("bad password".into()).into();
        assert!(e.to_string().contains("bus error"));
        assert!(e.to_string().contains("bad password"));
        let _: &dyn Error = &e;
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdin closed");
        let e: AppError = io_err.into();
        assert!(e.to_string().contains("io error"));
    }
}
