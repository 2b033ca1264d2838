use super::*;

#[test]
fn custom_body_escapes_markup_and_keeps_line_breaks() {
    let html = custom_body("Hi <team>,\nplease certify & confirm.\r\nThanks");
    assert_eq!(
        html,
        r#"<div style="font-family: Arial, sans-serif;">Hi &lt;team&gt;,<br/>please certify &amp; confirm.<br/>Thanks</div>"#
    );
}

#[test]
fn welcome_email_links_to_dashboard() {
    let email = welcome_email("new.user@example.com", "https://sox.example.com");
    assert_eq!(email.to, "new.user@example.com");
    assert_eq!(email.subject, WELCOME_SUBJECT);
    assert!(email.html.contains(r#"href="https://sox.example.com""#));
    assert!(email.html.contains("Go to Dashboard"));
}
