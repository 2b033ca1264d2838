use super::*;

#[test]
fn recipients_are_split_trimmed_and_blanks_dropped() {
    assert_eq!(
        parse_recipients(" a@example.com,, b@example.com ,"),
        vec!["a@example.com".to_string(), "b@example.com".to_string()]
    );
    assert!(parse_recipients(" , ,").is_empty());
}

#[tokio::test]
async fn log_mailer_skips_delivery() {
    let email = OutboundEmail {
        to: "a@example.com".into(),
        subject: "Reminder".into(),
        html: "<p>hi</p>".into(),
    };
    let delivery = LogMailer.send(&email).await.expect("send");
    assert_eq!(delivery, Delivery::Skipped);
}

#[tokio::test]
async fn log_mailer_rejects_empty_recipient_list() {
    let email = OutboundEmail {
        to: " , ".into(),
        subject: "Reminder".into(),
        html: String::new(),
    };
    let err = LogMailer.send(&email).await.expect_err("no recipients");
    assert!(matches!(err, MailError::NoRecipients));
}
