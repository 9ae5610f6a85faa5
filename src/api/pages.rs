//! Server-rendered HTML.
//!
//! Pages are small enough to keep inline. Anything user-supplied goes through
//! [`escape_html`] before it reaches markup.

use std::fmt::Write as _;

const STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:28rem;margin:4rem auto;padding:0 1rem}\
label{display:block;margin-top:1rem}input{width:100%;padding:.4rem}\
button{margin-top:1rem;padding:.4rem 1rem}.flash{color:#b00020}";

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n"
    )
}

/// Login form, with an optional one-shot message above it.
#[must_use]
pub fn login_page(flash: Option<&str>) -> String {
    let mut body = String::from("<h1>Sign in</h1>\n");
    if let Some(message) = flash {
        let _ = writeln!(body, "<p class=\"flash\" role=\"alert\">{}</p>", escape_html(message));
    }
    body.push_str(
        "<form method=\"post\" action=\"/login\">\n\
         <label>Username <input name=\"username\" autocomplete=\"username\" required></label>\n\
         <label>Password <input name=\"password\" type=\"password\" autocomplete=\"current-password\" required></label>\n\
         <button type=\"submit\">Sign in</button>\n\
         </form>\n",
    );
    layout("Sign in", &body)
}

/// Greeting shown to an authenticated user.
#[must_use]
pub fn landing_page(username: &str) -> String {
    let body = format!(
        "<h1>Hello, {}!</h1>\n\
         <form method=\"post\" action=\"/logout\">\n\
         <button type=\"submit\">Sign out</button>\n\
         </form>\n",
        escape_html(username)
    );
    layout("Hello", &body)
}

#[must_use]
pub fn unauthorized_page() -> String {
    layout(
        "Not signed in",
        "<h1>Not signed in</h1>\n<p>You need to <a href=\"/\">sign in</a> to view that page.</p>\n",
    )
}

#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
