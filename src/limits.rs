// Hard limits on stored data. Exceeding any of these is a client error.

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_PHONE_LEN: usize = 40;
pub const MAX_SERVICE_LEN: usize = 200;
pub const MAX_MESSAGE_LEN: usize = 4_000;

pub const MAX_APPOINTMENTS: usize = 500_000;

pub const MAX_CATALOG_ITEMS: usize = 10_000;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_SHORT_TEXT_LEN: usize = 64;
pub const MAX_DESCRIPTION_LEN: usize = 4_000;
pub const MAX_FEATURES: usize = 50;
pub const MAX_URL_LEN: usize = 2_048;

/// Accepted appointment years, inclusive.
pub const MIN_APPOINTMENT_YEAR: i32 = 2000;
pub const MAX_APPOINTMENT_YEAR: i32 = 2100;
