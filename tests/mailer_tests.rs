use std::{sync::Arc, time::Duration};

use readiq_backend::{
    AppConfig, MailerState,
    mailer::{Mailer, MockMailer, OutgoingMail, dispatch},
};

fn config() -> AppConfig {
    AppConfig {
        public_base_url: "https://readiq.test".to_string(),
        mail_from: "noreply@readiq.test".to_string(),
        ..AppConfig::default()
    }
}

#[test]
fn test_verification_mail_contents() {
    let mail = OutgoingMail::verification(&config(), "kid@example.com", "tok123");

    assert_eq!(mail.from, "noreply@readiq.test");
    assert_eq!(mail.to, "kid@example.com");
    assert_eq!(mail.subject, "Verify your ReadIQ Account");
    assert!(
        mail.body
            .contains("https://readiq.test/api/auth/verify-email?token=tok123")
    );
}

#[tokio::test]
async fn test_mock_records_even_when_failing() {
    let mailer = MockMailer::new_failing();
    let mail = OutgoingMail::verification(&config(), "a@example.com", "t");

    assert!(mailer.send(mail.clone()).await.is_err());
    assert_eq!(mailer.sent().await, vec![mail]);
}

#[tokio::test]
async fn test_dispatch_delivers_in_background() {
    let mock = Arc::new(MockMailer::new());
    let state: MailerState = mock.clone();

    dispatch(
        state,
        OutgoingMail::verification(&config(), "b@example.com", "t"),
    );

    for _ in 0..50 {
        if !mock.sent().await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let sent = mock.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "b@example.com");
}

#[tokio::test]
async fn test_dispatch_swallows_failures() {
    let mock = Arc::new(MockMailer::new_failing());
    let state: MailerState = mock.clone();

    // Must not panic the caller.
    dispatch(
        state,
        OutgoingMail::verification(&config(), "c@example.com", "t"),
    );

    for _ in 0..50 {
        if !mock.sent().await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(mock.sent().await.len(), 1);
}
