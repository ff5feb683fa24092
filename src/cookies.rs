use tower_cookies::Cookie;
use tower_cookies::cookie::{SameSite, time::Duration};

/// Creates a cookie scoped to the whole site.
///
/// Cookies are `HttpOnly` unless the page script has to read them, and
/// `Secure` when `secure` is set.
pub fn create_secure_cookie(
    name: &'static str,
    value: String,
    max_age_secs: i64,
    http_only: bool,
    secure: bool,
) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_http_only(http_only);
    cookie.set_secure(secure);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(Duration::seconds(max_age_secs));
    cookie.set_path("/");
    cookie
}

/// A cookie that clears `name` when passed to `Cookies::remove`.
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, "");
    cookie.set_max_age(Duration::seconds(0));
    cookie.set_path("/");
    cookie
}
