pub type UserId = i64;
