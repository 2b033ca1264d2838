//! HTML bodies for outgoing dashboard mail.

use crate::OutboundEmail;

pub const WELCOME_SUBJECT: &str = "Welcome to SOX Dashboard";

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Wraps an operator-typed plain-text body. Line breaks are kept.
pub fn custom_body(body: &str) -> String {
    let content = escape_html(body).replace("\r\n", "\n").replace('\n', "<br/>");
    format!(r#"<div style="font-family: Arial, sans-serif;">{content}</div>"#)
}

pub fn welcome_email(to: &str, dashboard_url: &str) -> OutboundEmail {
    let link = escape_html(dashboard_url);
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <div style="background: #00175A; color: white; padding: 20px; text-align: center;">
    <h1 style="margin: 0;">SOX Dashboard</h1>
  </div>
  <div style="padding: 30px; background: #f9f9f9;">
    <h2 style="color: #00175A;">Welcome!</h2>
    <p>You have been granted access to the SOX Dashboard.</p>
    <p>You can now login using your Microsoft account to view controls, certifications, and compliance status.</p>
    <p style="margin-top: 30px;">
      <a href="{link}" style="background: #006FCF; color: white; padding: 12px 24px; text-decoration: none; border-radius: 4px;">Go to Dashboard</a>
    </p>
    <p style="color: #666; font-size: 12px; margin-top: 30px;">If you have any questions, contact your administrator.</p>
  </div>
</div>"#
    );
    OutboundEmail {
        to: to.to_string(),
        subject: WELCOME_SUBJECT.to_string(),
        html,
    }
}

#[cfg(test)]
#[path = "tests/templates_tests.rs"]
mod tests;
