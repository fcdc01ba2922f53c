//! IMAP session tests against a scripted in-memory server.

use mailwire_imap::{
    Client, Error, ImapOptions, MessagesRange, SearchCondition, Status, StoreAction,
};
use mailwire_net::{AuthOptions, MailStream, TlsMode};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

enum Step {
    Send(&'static str),
    Expect(&'static str),
}

use Step::{Expect, Send};

async fn run_server(stream: DuplexStream, script: Vec<Step>) {
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut lines = BufReader::new(read_half).lines();

    for step in script {
        match step {
            Send(bytes) => write_half.write_all(bytes.as_bytes()).await.unwrap(),
            Expect(expected) => {
                let line = lines.next_line().await.unwrap().unwrap();
                assert_eq!(line, expected);
            }
        }
    }
}

fn plaintext_options() -> ImapOptions {
    ImapOptions {
        tls_mode: TlsMode::None,
        auth: AuthOptions {
            require_tls_for_auth: false,
            allow_cleartext_auth: false,
        },
        ..ImapOptions::default()
    }
}

fn client_and_server(script: Vec<Step>) -> (Client, tokio::task::JoinHandle<()>) {
    let (near, far) = tokio::io::duplex(16 * 1024);
    let server = tokio::spawn(run_server(far, script));
    let client = Client::from_stream(MailStream::mem(near), plaintext_options());
    (client, server)
}

#[tokio::test]
async fn greeting_and_login() {
    let (mut client, server) = client_and_server(vec![
        Send("* OK IMAP4rev1 server ready\r\n"),
        Expect("1 LOGIN \"mal\" \"serenity\""),
        Send("1 OK LOGIN completed\r\n"),
    ]);

    let greeting = client.read_greeting().await.unwrap();
    assert_eq!(greeting.status, Status::Ok);
    client.login("mal", "serenity").await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn bye_greeting_is_a_rejection() {
    let (mut client, server) =
        client_and_server(vec![Send("* BYE server shutting down\r\n")]);
    let err = client.read_greeting().await.unwrap_err();
    assert!(matches!(err, Error::ConnectRejected { .. }));
    server.await.unwrap();
}

#[tokio::test]
async fn cleartext_login_denied_by_policy() {
    let (near, _far) = tokio::io::duplex(1024);
    let options = ImapOptions {
        tls_mode: TlsMode::None,
        ..ImapOptions::default()
    };
    let mut client = Client::from_stream(MailStream::mem(near), options);
    let err = client.login("mal", "serenity").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Net(mailwire_net::Error::AuthForbidden)
    ));
}

#[tokio::test]
async fn login_quotes_special_characters() {
    let (mut client, server) = client_and_server(vec![
        Expect(r#"1 LOGIN "mal" "se\"re\\nity""#),
        Send("1 OK LOGIN completed\r\n"),
    ]);

    client.login("mal", "se\"re\\nity").await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn capability_collects_atoms() {
    let (mut client, server) = client_and_server(vec![
        Expect("1 CAPABILITY"),
        Send("* CAPABILITY IMAP4rev1 STARTTLS AUTH=PLAIN\r\n1 OK done\r\n"),
    ]);

    let capabilities = client.capability().await.unwrap();
    assert_eq!(capabilities, vec!["IMAP4rev1", "STARTTLS", "AUTH=PLAIN"]);
    server.await.unwrap();
}

#[tokio::test]
async fn select_gathers_mailbox_stat() {
    let (mut client, server) = client_and_server(vec![
        Expect("1 SELECT \"INBOX\""),
        Send(concat!(
            "* 172 EXISTS\r\n",
            "* 1 RECENT\r\n",
            "* OK [UNSEEN 12] Message 12 is first unseen\r\n",
            "* OK [UIDVALIDITY 3857529045] UIDs valid\r\n",
            "* OK [UIDNEXT 4392] Predicted next UID\r\n",
            "* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n",
            "1 OK [READ-WRITE] SELECT completed\r\n",
        )),
    ]);

    let stat = client.select("INBOX").await.unwrap();
    assert_eq!(stat.messages_no, 172);
    assert_eq!(stat.recent_messages_no, 1);
    assert_eq!(stat.unseen_messages_no, 12);
    assert_eq!(stat.uid_validity, 3_857_529_045);
    assert_eq!(stat.uid_next, 4392);
    server.await.unwrap();
}

#[tokio::test]
async fn fetch_resolves_the_literal_exactly() {
    let (mut client, server) = client_and_server(vec![
        Expect("1 FETCH 1 BODY[]"),
        // The literal is exactly 5 octets; the next line closes the list.
        Send("* 1 FETCH (BODY[] {5}\r\nhello)\r\n1 OK FETCH completed\r\n"),
    ]);

    let text = client.fetch(1, false).await.unwrap();
    assert_eq!(text, "hello");
    server.await.unwrap();
}

#[tokio::test]
async fn fetch_message_parses_rfc822_text() {
    let body = "Subject: status\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nstill flying\r\n";
    let header = format!("* 1 FETCH (BODY[] {{{}}}\r\n", body.len());
    let script = format!("{header}{body})\r\n1 OK FETCH completed\r\n");
    let script: &'static str = Box::leak(script.into_boxed_str());

    let (mut client, server) = client_and_server(vec![
        Expect("1 FETCH 7 BODY[]"),
        Send(script),
    ]);

    let message = client.fetch_message(7, false).await.unwrap();
    assert_eq!(message.subject, "status");
    assert_eq!(message.body_text().unwrap(), "still flying\r\n");
    server.await.unwrap();
}

#[tokio::test]
async fn uid_fetch_uses_the_uid_prefix() {
    let (mut client, server) = client_and_server(vec![
        Expect("1 UID FETCH 42 BODY[]"),
        Send("* 3 FETCH (UID 42 BODY[] {2}\r\nhi)\r\n1 OK done\r\n"),
    ]);

    assert_eq!(client.fetch(42, true).await.unwrap(), "hi");
    server.await.unwrap();
}

#[tokio::test]
async fn search_parses_hits() {
    let (mut client, server) = client_and_server(vec![
        Expect("1 SEARCH UNSEEN SUBJECT \"report\""),
        Send("* SEARCH 2 84 882\r\n1 OK SEARCH completed\r\n"),
    ]);

    let hits = client
        .search(
            &[
                SearchCondition::Unseen,
                SearchCondition::Subject("report".to_string()),
            ],
            false,
        )
        .await
        .unwrap();
    assert_eq!(hits, vec![2, 84, 882]);
    server.await.unwrap();
}

#[tokio::test]
async fn empty_search_defaults_to_all() {
    let (mut client, server) = client_and_server(vec![
        Expect("1 SEARCH ALL"),
        Send("* SEARCH\r\n1 OK SEARCH completed\r\n"),
    ]);

    let hits = client.search(&[], false).await.unwrap();
    assert!(hits.is_empty());
    server.await.unwrap();
}

#[tokio::test]
async fn store_and_close_remove_a_message() {
    let (mut client, server) = client_and_server(vec![
        Expect("1 STORE 3 +FLAGS.SILENT (\\Deleted)"),
        Send("1 OK STORE completed\r\n"),
        Expect("2 CLOSE"),
        Send("2 OK CLOSE completed\r\n"),
    ]);

    client.remove(3, false).await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn store_renders_ranges_and_flags() {
    let (mut client, server) = client_and_server(vec![
        Expect("1 UID STORE 100:200,250:* -FLAGS (\\Seen \\Flagged)"),
        Send("1 OK STORE completed\r\n"),
    ]);

    client
        .store(
            &[MessagesRange::range(100, 200), MessagesRange::starting_at(250)],
            StoreAction::Remove,
            &["\\Seen", "\\Flagged"],
            false,
            true,
        )
        .await
        .unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn no_reply_raises_a_server_error() {
    let (mut client, server) = client_and_server(vec![
        Expect("1 SELECT \"missing\""),
        Send("1 NO mailbox does not exist\r\n"),
    ]);

    let err = client.select("missing").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Server {
            status: Status::No,
            ..
        }
    ));
    server.await.unwrap();
}

#[tokio::test]
async fn unknown_tagged_status_is_a_parse_error() {
    let (mut client, server) = client_and_server(vec![
        Expect("1 CAPABILITY"),
        Send("1 MAYBE who knows\r\n"),
    ]);

    let err = client.capability().await.unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));
    server.await.unwrap();
}

#[tokio::test]
async fn logout_completes() {
    let (mut client, server) = client_and_server(vec![
        Expect("1 LOGOUT"),
        Send("* BYE logging out\r\n1 OK LOGOUT completed\r\n"),
    ]);

    client.logout().await.unwrap();
    server.await.unwrap();
}
