use super::test_support::*;
use super::*;

use std::time::Duration;

use mapkeep_shared::TokenDraft;

use crate::infrastructure::config::Limits;

const WAIT: Duration = Duration::from_secs(2);

fn join() -> ClientMessage {
    ClientMessage::Join {
        client_id: None,
        name: None,
        session_token: None,
    }
}

async fn joined(server: &TestServer, query: &str) -> TestWs {
    let mut ws = ws_connect(server.addr, query).await;
    ws_send_client(&mut ws, &join()).await;
    ws_expect_message(&mut ws, WAIT, |m| matches!(m, ServerMessage::Welcome { .. })).await;
    ws
}

#[tokio::test]
async fn join_returns_the_full_board_and_role() {
    let server = spawn_test_server(Limits::default(), true).await;
    let mut ws = ws_connect(server.addr, "?role=dm").await;

    ws_send_client(&mut ws, &join()).await;

    let welcome = ws_expect_message(&mut ws, WAIT, |m| {
        matches!(m, ServerMessage::Welcome { .. })
    })
    .await;
    let ServerMessage::Welcome {
        role,
        snapshot,
        history,
        ..
    } = welcome
    else {
        unreachable!()
    };
    assert_eq!(role, Role::Dm);
    assert!(snapshot.location.is_some());
    assert!(snapshot.floors.is_some());
    assert_eq!(history, Some(Vec::new()));
}

#[tokio::test]
async fn dm_edits_reach_every_viewer() {
    let server = spawn_test_server(Limits::default(), true).await;
    let mut dm = joined(&server, "?role=dm").await;
    let mut player = joined(&server, "").await;

    ws_send_client(
        &mut dm,
        &ClientMessage::SpawnToken {
            token: TokenDraft::default(),
        },
    )
    .await;

    for ws in [&mut dm, &mut player] {
        ws_expect_message(ws, WAIT, |m| {
            matches!(m, ServerMessage::StatePatch { events }
                if events.iter().any(|e| matches!(e, mapkeep_domain::MapEvent::TokenSpawned { .. })))
        })
        .await;
    }
    // History is for DMs only.
    ws_expect_message(&mut dm, WAIT, |m| {
        matches!(m, ServerMessage::HistoryEvent { .. })
    })
    .await;
    ws_expect_no_message_matching(&mut player, Duration::from_millis(300), |m| {
        matches!(m, ServerMessage::HistoryEvent { .. })
    })
    .await;
}

#[tokio::test]
async fn players_cannot_issue_dm_commands() {
    let server = spawn_test_server(Limits::default(), false).await;
    // Closed roles: the dm query is ignored.
    let mut ws = joined(&server, "?role=dm").await;

    ws_send_client(
        &mut ws,
        &ClientMessage::SpawnToken {
            token: TokenDraft::default(),
        },
    )
    .await;
    ws_send_client(&mut ws, &ClientMessage::Ping).await;

    // Nothing but the pong comes back.
    let msg = ws_recv_server(&mut ws).await;
    assert_eq!(msg, ServerMessage::Pong);
}

#[tokio::test]
async fn malformed_frames_get_an_error_and_the_socket_stays_open() {
    let server = spawn_test_server(Limits::default(), true).await;
    let mut ws = joined(&server, "").await;

    ws_send_raw(&mut ws, "not json".to_string()).await;
    let msg = ws_recv_server(&mut ws).await;
    assert!(matches!(
        msg,
        ServerMessage::Error {
            code: ErrorCode::ParseError,
            ..
        }
    ));

    ws_send_client(&mut ws, &ClientMessage::Ping).await;
    assert_eq!(ws_recv_server(&mut ws).await, ServerMessage::Pong);
}

#[tokio::test]
async fn oversized_frames_are_refused() {
    let limits = Limits {
        max_message_bytes: 1024,
        ..Limits::default()
    };
    let server = spawn_test_server(limits, true).await;
    let mut ws = joined(&server, "").await;

    let padding = "x".repeat(2048);
    ws_send_raw(&mut ws, format!("{{\"type\":\"join\",\"name\":\"{padding}\"}}")).await;
    let msg = ws_recv_server(&mut ws).await;
    assert!(matches!(
        msg,
        ServerMessage::Error {
            code: ErrorCode::MessageTooLarge,
            ..
        }
    ));

    ws_send_client(&mut ws, &ClientMessage::Ping).await;
    assert_eq!(ws_recv_server(&mut ws).await, ServerMessage::Pong);
}

#[tokio::test]
async fn connections_past_the_limit_are_turned_away() {
    let limits = Limits {
        max_clients: 1,
        ..Limits::default()
    };
    let server = spawn_test_server(limits, true).await;
    let _first = joined(&server, "").await;

    let mut second = ws_connect(server.addr, "").await;
    let msg = ws_recv_server(&mut second).await;
    assert!(matches!(
        msg,
        ServerMessage::Error {
            code: ErrorCode::ServerFull,
            ..
        }
    ));
}
