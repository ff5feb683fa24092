pub mod config;
pub mod cookies;
pub mod error;
pub mod state;
pub mod db;
pub mod flash;
pub mod routes;
pub mod views;

pub mod crypto {
    pub mod csrf;
    pub mod password;
}

pub mod models {
    pub mod attendance;
    pub mod session;
    pub mod user;
}

pub mod repositories {
    pub mod attendance;
    pub mod session;
    pub mod user;
}

pub mod services {
    pub mod attendance;
    pub mod auth;
    pub mod qr;
}

pub mod handlers {
    pub mod auth;
    pub mod qr;
    pub mod student;
    pub mod teacher;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod csrf;
}

pub mod validation {
    pub mod auth;
    pub mod form;
    pub mod scan;
}

pub use config::Config;
pub use routes::build_router;
pub use state::AppState;
