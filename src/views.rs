//! Server-rendered HTML pages.

use std::fmt::Write as _;

use axum::http::StatusCode;

use crate::flash::Flash;
use crate::models::attendance::AttendanceRecord;
use crate::models::session::Session;
use crate::models::user::Role;
use crate::services::qr::QrArtifact;
use crate::validation::form::FieldErrors;

const STYLE: &str = "body{font-family:sans-serif;max-width:48rem;margin:2rem auto;padding:0 1rem}\
.flash{padding:.5rem 1rem;margin:.5rem 0;border-radius:4px}\
.success{background:#d1e7dd}.danger{background:#f8d7da}\
.field-error{color:#b02a37;font-size:.9rem}\
label{display:block;margin-top:.75rem}\
table{border-collapse:collapse;width:100%}td,th{border:1px solid #ccc;padding:.25rem .5rem}";

/// Escapes text for use in HTML element content and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn layout(title: &str, session: Option<&Session>, flashes: &[Flash], body: &str) -> String {
    let mut nav = String::new();
    match session {
        Some(session) => {
            let _ = write!(
                nav,
                "Signed in as <strong>{}</strong> ({}) · <a href=\"/logout\">Log out</a>",
                escape(&session.username),
                session.role
            );
        }
        None => nav.push_str("<a href=\"/login\">Log in</a> · <a href=\"/register\">Register</a>"),
    }

    let mut messages = String::new();
    for flash in flashes {
        let _ = write!(
            messages,
            "<div class=\"flash {}\">{}</div>",
            flash.level.as_str(),
            escape(&flash.message)
        );
    }

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>{title} · QR Attendance</title><style>{STYLE}</style></head>\
         <body><nav>{nav}</nav><h1>{title}</h1>{messages}{body}</body></html>",
        title = escape(title),
    )
}

fn field_errors(errors: &FieldErrors, field: &str) -> String {
    errors
        .for_field(field)
        .map(|m| format!("<div class=\"field-error\">{}</div>", escape(m)))
        .collect()
}

fn csrf_input(csrf_token: &str) -> String {
    format!(
        "<input type=\"hidden\" name=\"csrf_token\" value=\"{}\">",
        escape(csrf_token)
    )
}

pub fn register_page(
    csrf_token: &str,
    flashes: &[Flash],
    errors: &FieldErrors,
    username: &str,
    role: Option<Role>,
) -> String {
    let selected = |r: Role| if role == Some(r) { " selected" } else { "" };
    let body = format!(
        "<form method=\"post\" action=\"/register\">{csrf}\
         <label>Username <input name=\"username\" value=\"{username}\" required></label>{username_errors}\
         <label>Password <input type=\"password\" name=\"password\" required></label>{password_errors}\
         <label>Confirm Password <input type=\"password\" name=\"confirm_password\" required></label>{confirm_errors}\
         <label>Role <select name=\"role\">\
         <option value=\"student\"{student}>Student</option>\
         <option value=\"teacher\"{teacher}>Teacher</option></select></label>{role_errors}\
         <p><button type=\"submit\">Register</button></p></form>\
         <p>Already registered? <a href=\"/login\">Log in</a></p>",
        csrf = csrf_input(csrf_token),
        username = escape(username),
        username_errors = field_errors(errors, "username"),
        password_errors = field_errors(errors, "password"),
        confirm_errors = field_errors(errors, "confirm_password"),
        role_errors = field_errors(errors, "role"),
        student = selected(Role::Student),
        teacher = selected(Role::Teacher),
    );
    layout("Register", None, flashes, &body)
}

pub fn login_page(csrf_token: &str, flashes: &[Flash], errors: &FieldErrors, username: &str) -> String {
    let body = format!(
        "<form method=\"post\" action=\"/login\">{csrf}\
         <label>Username <input name=\"username\" value=\"{username}\" required></label>{username_errors}\
         <label>Password <input type=\"password\" name=\"password\" required></label>{password_errors}\
         <p><button type=\"submit\">Login</button></p></form>\
         <p>No account? <a href=\"/register\">Register</a></p>",
        csrf = csrf_input(csrf_token),
        username = escape(username),
        username_errors = field_errors(errors, "username"),
        password_errors = field_errors(errors, "password"),
    );
    layout("Login", None, flashes, &body)
}

pub fn scan_page(csrf_token: &str, session: &Session, flashes: &[Flash], errors: &FieldErrors) -> String {
    let body = format!(
        "<form method=\"post\" action=\"/student\" enctype=\"multipart/form-data\">{csrf}\
         <label>Period <input name=\"period\" required></label>{period_errors}\
         <input type=\"hidden\" name=\"teacher_id\" value=\"{teacher}\">\
         <label>QR Code <input type=\"file\" name=\"qr_code\" accept=\"image/*\" required></label>{qr_errors}\
         <p><button type=\"submit\">Mark Attendance</button></p></form>\
         <p><a href=\"/teacher\">View attendance records</a></p>",
        csrf = csrf_input(csrf_token),
        period_errors = field_errors(errors, "period"),
        teacher = escape(&session.username),
        qr_errors = field_errors(errors, "qr_code"),
    );
    layout("Scan QR Code", Some(session), flashes, &body)
}

pub fn teacher_page(session: &Session, flashes: &[Flash], records: &[AttendanceRecord]) -> String {
    let mut body = String::from("<p><a href=\"/student\">Scan a QR code</a></p>");
    if records.is_empty() {
        body.push_str("<p>No attendance records yet.</p>");
    } else {
        body.push_str(
            "<table><thead><tr><th>Student ID</th><th>Student Name</th>\
             <th>Period</th><th>Timestamp</th></tr></thead><tbody>",
        );
        for record in records {
            let _ = write!(
                body,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(&record.student_id),
                escape(&record.student_name),
                escape(&record.period),
                record.recorded_at.format("%Y-%m-%d %H:%M:%S UTC"),
            );
        }
        body.push_str("</tbody></table>");
    }
    layout("Attendance Records", Some(session), flashes, &body)
}

pub fn qr_page(session: Option<&Session>, flashes: &[Flash], artifact: Option<&QrArtifact>) -> String {
    let body = match artifact {
        Some(artifact) => format!(
            "<p>Show this code to your teacher to mark attendance.</p>\
             <p><img src=\"{url}\" alt=\"QR code for {id}\"></p>\
             <p><a href=\"{url}\" download>Download QR code</a></p>",
            url = escape(&artifact.url),
            id = escape(&artifact.student_id),
        ),
        None => "<p>No QR code to display.</p>".to_string(),
    };
    layout("Your QR Code", session, flashes, &body)
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let body = format!(
        "<p>{}</p><p><a href=\"/login\">Back to login</a></p>",
        escape(message)
    );
    layout(
        status.canonical_reason().unwrap_or("Error"),
        None,
        &[],
        &body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::form::FieldError;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#x27;y&#x27;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_register_page_shows_field_errors_and_keeps_input() {
        let errors = FieldErrors(vec![FieldError {
            field: "confirm_password".to_string(),
            message: "Passwords must match".to_string(),
        }]);
        let html = register_page("tok", &[], &errors, "<alice>", Some(Role::Teacher));
        assert!(html.contains("Passwords must match"));
        assert!(html.contains("value=\"&lt;alice&gt;\""));
        assert!(html.contains("<option value=\"teacher\" selected>"));
        assert!(html.contains("name=\"csrf_token\" value=\"tok\""));
    }

    #[test]
    fn test_flashes_are_escaped() {
        let html = login_page("tok", &[Flash::danger("<b>bad</b>")], &FieldErrors::default(), "");
        assert!(html.contains("<div class=\"flash danger\">&lt;b&gt;bad&lt;/b&gt;</div>"));
    }
}
