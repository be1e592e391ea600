use std::io;

use actix_web::{ResponseError, http::StatusCode};
use hevo_power::AppError;

#[test]
fn status_codes_follow_variant() {
    let cases = [
        (AppError::PermissionDenied("x".into()), StatusCode::FORBIDDEN),
        (AppError::LineBusy("x".into()), StatusCode::CONFLICT),
        (AppError::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        (AppError::Gpio("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, status) in cases {
        assert_eq!(err.status_code(), status, "{err}");
    }
}

#[test]
fn os_errors_are_classified_by_kind() {
    let classify = |errno| AppError::from_os_error("request lines", &io::Error::from_raw_os_error(errno));

    // EACCES, EPERM
    assert!(matches!(classify(13), AppError::PermissionDenied(_)));
    assert!(matches!(classify(1), AppError::PermissionDenied(_)));
    // EBUSY
    assert!(matches!(classify(16), AppError::LineBusy(_)));
    // ENOENT, EINVAL
    assert!(matches!(classify(2), AppError::Config(_)));
    assert!(matches!(classify(22), AppError::Config(_)));
    // EIO
    assert!(matches!(classify(5), AppError::Gpio(_)));
}

#[test]
fn classified_message_keeps_context() {
    let err = AppError::from_os_error("open chip /dev/gpiochip9", &io::Error::from_raw_os_error(2));
    assert!(err.to_string().starts_with("Configuration error: open chip /dev/gpiochip9: "));
}
