pub const NAME_MAX_LENGTH: usize = 255;
pub const TITLE_MAX_LENGTH: usize = 255;
pub const LINK_MAX_LENGTH: usize = 255;
pub const EMAIL_MAX_LENGTH: usize = 255;
pub const PASSWORD_MIN_LENGTH: usize = 5;

// NUMERIC(5, 2)
pub const PRICE_MAX_DIGITS: u32 = 5;
pub const PRICE_DECIMAL_PLACES: u32 = 2;

pub const SESSION_COOKIE: &str = "session";
pub const DEFAULT_SESSION_LIFETIME_HOURS: i64 = 24;
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const REQUIRED_FIELD: &str = "This field is required.";
pub const BLANK_FIELD: &str = "This field may not be blank.";
