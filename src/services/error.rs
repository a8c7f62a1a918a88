//! Error helpers for the status routes

use axum::http::StatusCode;
use log::error;

/// Log an error under a `[tag]`-style context and turn it into a status code
pub trait LogErr<T> {
    fn log_500(self, context: &str) -> Result<T, StatusCode>;

    fn log_status(self, context: &str, status: StatusCode) -> Result<T, StatusCode>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    fn log_500(self, context: &str) -> Result<T, StatusCode> {
        self.log_status(context, StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn log_status(self, context: &str, status: StatusCode) -> Result<T, StatusCode> {
        self.map_err(|e| {
            error!("{}: {}", context, e);
            status
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_the_requested_status() {
        let failed: Result<(), &str> = Err("pool timed out");
        assert_eq!(
            failed.log_status("[status] count", StatusCode::SERVICE_UNAVAILABLE),
            Err(StatusCode::SERVICE_UNAVAILABLE)
        );
        let failed: Result<(), &str> = Err("boom");
        assert_eq!(failed.log_500("[status] count"), Err(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn ok_passes_through() {
        let ok: Result<u8, &str> = Ok(7);
        assert_eq!(ok.log_500("unused"), Ok(7));
    }
}
