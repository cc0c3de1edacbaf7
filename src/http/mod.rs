pub mod handlers {
    pub mod admin;
    pub mod ops;
    pub mod payments;
    pub mod webhooks;
}
pub mod middleware {
    pub mod admin_auth;
    pub mod rate_limit;
}
