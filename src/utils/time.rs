use chrono::{DateTime, Utc};

pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}
